//! Typed cache keys.
//!
//! Every key starts with a [`Resource`], so invalidation targets are checked
//! by the compiler instead of being hand-typed strings at each call site.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server resources the client caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Referrals,
    ReferralActivities,
    ReferralAnswers,
    ReferralAnswerValidationRequests,
    ReferralAttachments,
    ReferralMessages,
    Topics,
    Units,
    UnitMemberships,
    Users,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Referrals => "referrals",
            Resource::ReferralActivities => "referralactivities",
            Resource::ReferralAnswers => "referralanswers",
            Resource::ReferralAnswerValidationRequests => "referralanswervalidationrequests",
            Resource::ReferralAttachments => "referralattachments",
            Resource::ReferralMessages => "referralmessages",
            Resource::Topics => "topics",
            Resource::Units => "units",
            Resource::UnitMemberships => "unitmemberships",
            Resource::Users => "users",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
    Int(i64),
    Text(String),
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        KeySegment::Int(value)
    }
}

impl From<u32> for KeySegment {
    fn from(value: u32) -> Self {
        KeySegment::Int(i64::from(value))
    }
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        KeySegment::Text(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        KeySegment::Text(value)
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Int(value) => write!(f, "{value}"),
            KeySegment::Text(value) => write!(f, "{value:?}"),
        }
    }
}

/// `[resource, ...qualifiers]`, compared structurally.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    segments: Vec<KeySegment>,
}

impl CacheKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            segments: vec![KeySegment::Text(resource.as_str().to_string())],
        }
    }

    /// Append a qualifier.
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    /// True when `prefix` is this key or an ancestor of it.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl From<Resource> for CacheKey {
    fn from(resource: Resource) -> Self {
        CacheKey::new(resource)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{segment}")?;
        }
        f.write_str("]")
    }
}

/// Key builders for the queries the client issues.
pub mod keys {
    use super::{CacheKey, Resource};

    pub fn referrals() -> CacheKey {
        CacheKey::new(Resource::Referrals)
    }

    pub fn referral(id: i64) -> CacheKey {
        referrals().with(id)
    }

    pub fn referral_activities(referral: i64) -> CacheKey {
        CacheKey::new(Resource::ReferralActivities).with(format!("referral={referral}"))
    }

    pub fn referral_answers() -> CacheKey {
        CacheKey::new(Resource::ReferralAnswers)
    }

    pub fn referral_answer(id: &str) -> CacheKey {
        referral_answers().with(id)
    }

    pub fn referral_answers_for(referral: i64) -> CacheKey {
        referral_answers().with(format!("referral={referral}"))
    }

    pub fn validation_requests_for(answer: &str) -> CacheKey {
        CacheKey::new(Resource::ReferralAnswerValidationRequests).with(format!("answer={answer}"))
    }

    pub fn referral_attachments(referral: i64) -> CacheKey {
        CacheKey::new(Resource::ReferralAttachments).with(format!("referral={referral}"))
    }

    pub fn referral_messages(referral: i64) -> CacheKey {
        CacheKey::new(Resource::ReferralMessages).with(format!("referral={referral}"))
    }

    pub fn unit_memberships(unit: &str) -> CacheKey {
        CacheKey::new(Resource::UnitMemberships).with(format!("unit={unit}"))
    }

    pub fn current_user() -> CacheKey {
        CacheKey::new(Resource::Users).with("whoami")
    }
}
