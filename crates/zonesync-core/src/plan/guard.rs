//! Zone guard
//!
//! No run may mutate a name outside its zone. [`enforce`] checks every action
//! of a plan and rejects the whole plan on the first out-of-zone name; it never
//! filters actions out. [`SafePlan`] can only be obtained through [`enforce`],
//! and the executor only accepts a [`SafePlan`].

use tracing::{debug, error};

use super::{ChangeAction, ChangePlan};
use crate::error::{Error, Result};
use crate::model::Zone;

/// A change plan whose every name is inside `zone`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePlan {
    zone: Zone,
    plan: ChangePlan,
}

impl SafePlan {
    /// The zone the plan was checked against
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// The checked plan
    pub fn plan(&self) -> &ChangePlan {
        &self.plan
    }

    /// Actions in execution order
    pub fn actions(&self) -> &[ChangeAction] {
        self.plan.actions()
    }

    /// Give back the plan
    pub fn into_plan(self) -> ChangePlan {
        self.plan
    }
}

/// Check that every action of `plan` stays inside `zone`
pub fn enforce(zone: &Zone, plan: ChangePlan) -> Result<SafePlan> {
    for action in &plan {
        if let Some(outside) = action.names().find(|name| !zone.contains(name)) {
            error!(
                "Rejecting plan: {} targets '{}' outside zone '{}'",
                action.kind().label(),
                outside,
                zone
            );
            return Err(Error::zone_violation(outside.as_str(), zone.as_str()));
        }
    }

    debug!("All {} planned actions are within zone {}", plan.len(), zone);
    Ok(SafePlan {
        zone: zone.clone(),
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurrentState, DesiredState, Fqdn, Record};
    use crate::plan::diff;
    use std::net::Ipv4Addr;

    fn rec(name: &str) -> Record {
        Record::new(Fqdn::parse(name).unwrap(), Ipv4Addr::new(10, 0, 0, 1))
    }

    fn plan_for(names: &[&str]) -> ChangePlan {
        let desired = DesiredState::from_records(names.iter().map(|n| rec(n))).unwrap();
        diff(&desired, &CurrentState::new())
    }

    #[test]
    fn accepts_in_zone_plan() {
        let zone = Zone::parse("zone.com").unwrap();
        let safe = enforce(&zone, plan_for(&["a.zone.com", "zone.com", "x.y.zone.com"])).unwrap();
        assert_eq!(safe.actions().len(), 3);
        assert_eq!(safe.zone(), &zone);
    }

    #[test]
    fn rejects_whole_plan_on_out_of_zone_name() {
        let zone = Zone::parse("zone.com").unwrap();
        let result = enforce(&zone, plan_for(&["a.zone.com", "evil.other-zone.com"]));

        match result {
            Err(Error::ZoneViolation { fqdn, zone }) => {
                assert_eq!(fqdn, "evil.other-zone.com");
                assert_eq!(zone, "zone.com");
            }
            other => panic!("expected zone violation, got {:?}", other),
        }
    }

    #[test]
    fn suffix_without_dot_boundary_is_outside() {
        let zone = Zone::parse("example.com").unwrap();
        assert!(enforce(&zone, plan_for(&["fooexample.com"])).is_err());
    }

    #[test]
    fn case_insensitive_membership() {
        let zone = Zone::parse("ZONE.com").unwrap();
        assert!(enforce(&zone, plan_for(&["Host.Zone.COM."])).is_ok());
    }
}
