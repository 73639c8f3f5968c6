//! Repair orchestration engine for Fixwise.
//!
//! This crate defines the capability traits (knowledge adapters, vision
//! classifier, session store) that the infrastructure layer implements, and
//! the engine built on top of them: research aggregation, plan synthesis,
//! the readiness policy, the discovery coordinator, the conversational
//! guide, and the session manager. It depends only on `fixwise-types` --
//! never on `fixwise-infra` or any network/database crate.

pub mod agent;
pub mod capability;
pub mod plan;
pub mod research;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
