//! Request metering against the upstream quotas.

pub mod quota;
