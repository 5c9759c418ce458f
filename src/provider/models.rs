//! Minimal server models the shared providers load.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    Owner,
    Admin,
    Member,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitMembership {
    pub unit: Uuid,
    pub role: MembershipRole,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub memberships: Vec<UnitMembership>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Role the user holds in `unit`, if any.
    pub fn role_in(&self, unit: Uuid) -> Option<MembershipRole> {
        self.memberships
            .iter()
            .find(|m| m.unit == unit)
            .map(|m| m.role)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralState {
    Draft,
    Received,
    Assigned,
    Processing,
    InValidation,
    Answered,
    Closed,
    Incomplete,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: i64,
    pub state: ReferralState,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub units: Vec<Uuid>,
}
