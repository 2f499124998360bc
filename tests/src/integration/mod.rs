//! Cross-crate integration scenarios.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod audit_flows;
#[cfg(test)]
mod bus_isolation;
#[cfg(test)]
mod change_requests;
#[cfg(test)]
mod history_flows;
