use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::debug;

use crate::entities::prelude::{Assembly, Attendance, Owner, Proxy, Unit};
use crate::entities::{attendance, owner, proxy, unit};

use super::EngineError;

/// One unit whose vote a person is entitled to cast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitShare {
    pub unit_id: i64,
    pub name: String,
    pub coefficient: Decimal,
}

/// A present person together with every unit they currently represent,
/// whether as owner or as delegation holder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VotingEntity {
    pub cedula: String,
    pub display_name: String,
    pub units: Vec<UnitShare>,
    pub total_coefficient: Decimal,
}

/// Resolves who may vote in an assembly right now, merged per person and
/// sorted by display name. Safe to call inside or outside a transaction.
pub async fn resolve_eligible_voters<C: ConnectionTrait>(
    conn: &C,
    assembly_id: i64,
) -> Result<Vec<VotingEntity>, EngineError> {
    if Assembly::find_by_id(assembly_id).one(conn).await?.is_none() {
        return Err(EngineError::AssemblyNotFound { assembly_id });
    }

    let units = Unit::find()
        .order_by_asc(unit::Column::UnitId)
        .all(conn)
        .await?;
    let owners = Owner::find().all(conn).await?;
    let delegations = Proxy::find()
        .filter(proxy::Column::AssemblyId.eq(assembly_id))
        .all(conn)
        .await?;
    let roster = Attendance::find()
        .filter(attendance::Column::AssemblyId.eq(assembly_id))
        .all(conn)
        .await?;

    Ok(resolve_entities(&units, &owners, &delegations, &roster))
}

/// Pure resolution over loaded rows.
///
/// Per unit: a delegation hands the vote to its holder if that holder is
/// present, and supersedes the owner entirely; otherwise the owner carries
/// the unit if registered, active and present. Units that reach nobody are
/// skipped, never an error.
pub fn resolve_entities(
    units: &[unit::Model],
    owners: &[owner::Model],
    delegations: &[proxy::Model],
    roster: &[attendance::Model],
) -> Vec<VotingEntity> {
    let owners_by_cedula: HashMap<&str, &owner::Model> = owners
        .iter()
        .map(|owner| (owner.cedula.as_str(), owner))
        .collect();
    let present: HashMap<&str, &attendance::Model> = roster
        .iter()
        .filter(|entry| entry.present)
        .map(|entry| (entry.cedula.as_str(), entry))
        .collect();
    let delegated_units: HashMap<i64, &proxy::Model> = delegations
        .iter()
        .map(|delegation| (delegation.unit_id, delegation))
        .collect();

    let mut entities: HashMap<&str, VotingEntity> = HashMap::new();
    for unit in units {
        let Some(owner_cedula) = unit.owner_cedula.as_deref() else {
            debug!(unit = %unit.name, "Unit has no registered owner; skipped");
            continue;
        };

        let representative = match delegated_units.get(&unit.unit_id) {
            // A delegation supersedes the owner, even when the owner is
            // also present.
            Some(delegation) => match present.get(delegation.proxy_cedula.as_str()) {
                Some(entry) => Some((entry.cedula.as_str(), entry.name.as_str())),
                None => {
                    debug!(
                        unit = %unit.name,
                        proxy = %delegation.proxy_cedula,
                        "Delegation holder is not present; unit skipped"
                    );
                    None
                }
            },
            None => match owners_by_cedula.get(owner_cedula) {
                Some(owner) if !owner.active => {
                    debug!(unit = %unit.name, "Owner is deactivated; unit skipped");
                    None
                }
                _ => present
                    .get(owner_cedula)
                    .map(|entry| (entry.cedula.as_str(), entry.name.as_str())),
            },
        };

        let Some((cedula, display_name)) = representative else {
            continue;
        };

        let share = UnitShare {
            unit_id: unit.unit_id,
            name: unit.name.clone(),
            coefficient: unit.coefficient,
        };
        let entity = entities.entry(cedula).or_insert_with(|| VotingEntity {
            cedula: cedula.to_string(),
            display_name: display_name.to_string(),
            units: Vec::new(),
            total_coefficient: Decimal::ZERO,
        });
        entity.total_coefficient += share.coefficient;
        entity.units.push(share);
    }

    let mut resolved: Vec<VotingEntity> = entities.into_values().collect();
    resolved.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.cedula.cmp(&b.cedula))
    });
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::attendance::AttendeeKind;
    use chrono::{DateTime, FixedOffset};

    fn ts() -> DateTime<FixedOffset> {
        DateTime::from_timestamp(0, 0).expect("epoch").fixed_offset()
    }

    fn unit(unit_id: i64, name: &str, coefficient: Decimal, owner: Option<&str>) -> unit::Model {
        unit::Model {
            unit_id,
            name: name.to_string(),
            coefficient,
            owner_cedula: owner.map(|cedula| cedula.to_string()),
        }
    }

    fn owner(cedula: &str, name: &str, active: bool) -> owner::Model {
        owner::Model {
            cedula: cedula.to_string(),
            name: name.to_string(),
            phone: None,
            active,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn attendee(cedula: &str, name: &str, present: bool) -> attendance::Model {
        attendance::Model {
            assembly_id: 1,
            cedula: cedula.to_string(),
            name: name.to_string(),
            attendee_kind: AttendeeKind::Owner,
            present,
            marked_at: ts(),
        }
    }

    fn delegation(unit_id: i64, holder: &str, holder_name: &str) -> proxy::Model {
        proxy::Model {
            proxy_id: unit_id,
            assembly_id: 1,
            unit_id,
            proxy_cedula: holder.to_string(),
            proxy_name: holder_name.to_string(),
            granted_at: ts(),
        }
    }

    #[test]
    fn merges_owned_and_delegated_units_per_person() {
        let units = vec![
            unit(1, "U1", Decimal::new(30, 2), Some("100")),
            unit(2, "U2", Decimal::new(20, 2), Some("200")),
            unit(3, "U3", Decimal::new(50, 2), Some("300")),
        ];
        let owners = vec![
            owner("100", "Olga Uno", true),
            owner("200", "Oscar Dos", true),
            owner("300", "Omar Tres", true),
        ];
        let delegations = vec![delegation(2, "100", "Olga Uno")];
        let roster = vec![
            attendee("100", "Olga Uno", true),
            attendee("300", "Omar Tres", true),
        ];

        let resolved = resolve_entities(&units, &owners, &delegations, &roster);
        assert_eq!(resolved.len(), 2);

        let olga = &resolved[0];
        assert_eq!(olga.cedula, "100");
        assert_eq!(olga.units.len(), 2);
        assert_eq!(olga.total_coefficient, Decimal::new(50, 2));

        let omar = &resolved[1];
        assert_eq!(omar.cedula, "300");
        assert_eq!(omar.units.len(), 1);
        assert_eq!(omar.total_coefficient, Decimal::new(50, 2));
    }

    #[test]
    fn delegation_supersedes_present_owner() {
        let units = vec![unit(2, "U2", Decimal::new(20, 2), Some("200"))];
        let owners = vec![owner("100", "Olga", true), owner("200", "Oscar", true)];
        let delegations = vec![delegation(2, "100", "Olga")];
        // Both people are present, but the delegation wins.
        let roster = vec![attendee("100", "Olga", true), attendee("200", "Oscar", true)];

        let resolved = resolve_entities(&units, &owners, &delegations, &roster);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].cedula, "100");
        assert_eq!(resolved[0].units[0].unit_id, 2);
    }

    #[test]
    fn absent_people_carry_nothing() {
        let units = vec![
            unit(1, "U1", Decimal::new(30, 2), Some("100")),
            unit(2, "U2", Decimal::new(20, 2), Some("200")),
        ];
        let owners = vec![owner("100", "Olga", true), owner("200", "Oscar", true)];
        // Oscar is on the roster but marked not present.
        let roster = vec![attendee("100", "Olga", true), attendee("200", "Oscar", false)];

        let resolved = resolve_entities(&units, &owners, &[], &roster);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].cedula, "100");
    }

    #[test]
    fn delegation_to_absent_holder_skips_the_unit() {
        let units = vec![unit(2, "U2", Decimal::new(20, 2), Some("200"))];
        let owners = vec![owner("200", "Oscar", true)];
        let delegations = vec![delegation(2, "999", "Pedro")];
        // The owner is present, but the unit is delegated away and the
        // holder never showed up.
        let roster = vec![attendee("200", "Oscar", true)];

        let resolved = resolve_entities(&units, &owners, &delegations, &roster);
        assert!(resolved.is_empty());
    }

    #[test]
    fn unowned_units_are_skipped() {
        let units = vec![
            unit(1, "U1", Decimal::new(30, 2), None),
            unit(2, "U2", Decimal::new(20, 2), Some("100")),
        ];
        let owners = vec![owner("100", "Olga", true)];
        let roster = vec![attendee("100", "Olga", true)];

        let resolved = resolve_entities(&units, &owners, &[], &roster);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].units.len(), 1);
        assert_eq!(resolved[0].units[0].unit_id, 2);
    }

    #[test]
    fn deactivated_owner_has_no_own_standing() {
        let units = vec![unit(1, "U1", Decimal::new(30, 2), Some("100"))];
        let owners = vec![owner("100", "Olga", false)];
        let roster = vec![attendee("100", "Olga", true)];

        let resolved = resolve_entities(&units, &owners, &[], &roster);
        assert!(resolved.is_empty());
    }

    #[test]
    fn delegation_still_carries_a_deactivated_owners_unit() {
        let units = vec![unit(1, "U1", Decimal::new(30, 2), Some("100"))];
        let owners = vec![owner("100", "Olga", false), owner("200", "Oscar", true)];
        let delegations = vec![delegation(1, "200", "Oscar")];
        let roster = vec![attendee("200", "Oscar", true)];

        let resolved = resolve_entities(&units, &owners, &delegations, &roster);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].cedula, "200");
        assert_eq!(resolved[0].total_coefficient, Decimal::new(30, 2));
    }

    #[test]
    fn resolution_order_is_deterministic() {
        let units = vec![
            unit(1, "U1", Decimal::new(10, 2), Some("300")),
            unit(2, "U2", Decimal::new(10, 2), Some("100")),
            unit(3, "U3", Decimal::new(10, 2), Some("200")),
        ];
        let owners = vec![
            owner("100", "Zoe", true),
            owner("200", "Ana", true),
            owner("300", "Ana", true),
        ];
        let roster = vec![
            attendee("100", "Zoe", true),
            attendee("200", "Ana", true),
            attendee("300", "Ana", true),
        ];

        let resolved = resolve_entities(&units, &owners, &[], &roster);
        let order: Vec<&str> = resolved.iter().map(|entity| entity.cedula.as_str()).collect();
        // Same display name falls back to cedula order.
        assert_eq!(order, vec!["200", "300", "100"]);
    }
}
