//! Record normalization ahead of export

use serde_json::{Map, Value};

use crate::extractors::FollowingProfile;

/// Plain key-value mapping handed to the exporter
pub type Record = Map<String, Value>;

/// Anything the exporter accepts as a row
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileRecord {
    Profile(FollowingProfile),
    Mapping(Record),
}

impl From<FollowingProfile> for ProfileRecord {
    fn from(profile: FollowingProfile) -> Self {
        ProfileRecord::Profile(profile)
    }
}

impl From<Record> for ProfileRecord {
    fn from(record: Record) -> Self {
        ProfileRecord::Mapping(record)
    }
}

impl ProfileRecord {
    /// Independent mapping for this record
    pub fn to_record(&self) -> Record {
        match self {
            ProfileRecord::Profile(profile) => profile.to_record(),
            ProfileRecord::Mapping(record) => record.clone(),
        }
    }
}

impl FollowingProfile {
    /// Mapping with camelCase keys in field order; absent optionals become `null`
    pub fn to_record(&self) -> Record {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Record::new(),
        }
    }
}

/// Convert records to plain mappings, preserving input order
pub fn to_records<'a, I>(entries: I) -> Vec<Record>
where
    I: IntoIterator<Item = &'a ProfileRecord>,
{
    entries.into_iter().map(ProfileRecord::to_record).collect()
}

/// Convenience for the common case of freshly extracted profiles
pub fn profiles_to_records(profiles: &[FollowingProfile]) -> Vec<Record> {
    profiles.iter().map(FollowingProfile::to_record).collect()
}
