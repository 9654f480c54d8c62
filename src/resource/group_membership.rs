//! `gitlab_group_membership`, addressed `<group_id>:<user_id>`.

use crate::client::Client;
use chrono::NaiveDate;
use labapi::{GroupMember, MemberOptions};
use reconcile::{
    AccessLevel, CallResult, CancelToken, CompositeKey, Error, IdFormat, IdPart, ManagedKind,
    Result, WireEnum,
};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_group_membership";
pub const ID_FORMAT: IdFormat = IdFormat::new(&["group_id", "user_id"]);

#[derive(Debug, Clone, Deserialize)]
pub struct MembershipSpec {
    pub group_id: String,
    pub user_id: i64,
    pub access_level: AccessLevel,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipState {
    pub group_id: String,
    pub user_id: i64,
    pub username: String,
    pub access_level: AccessLevel,
    #[serde(default)]
    pub expires_at: Option<String>,
}

impl MembershipState {
    fn from_member(group_id: &str, member: GroupMember) -> Result<Self> {
        Ok(Self {
            group_id: group_id.to_string(),
            user_id: member.id,
            username: member.username,
            access_level: AccessLevel::from_code(member.access_level)?,
            expires_at: member.expires_at,
        })
    }
}

fn validate_expiry(expires_at: Option<&str>) -> Result<()> {
    if let Some(date) = expires_at {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            Error::document(KIND, format!("expires_at {date:?} is not a YYYY-MM-DD date: {e}"))
        })?;
    }
    Ok(())
}

pub struct GroupMemberships {
    client: Client,
}

impl GroupMemberships {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ManagedKind for GroupMemberships {
    type Desired = MembershipSpec;
    type Observed = MembershipState;
    type Change = MemberOptions;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn id_format(&self) -> IdFormat {
        ID_FORMAT
    }

    fn label(&self, desired: &MembershipSpec) -> String {
        format!("{}:{}", desired.group_id, desired.user_id)
    }

    fn create(
        &self,
        desired: &MembershipSpec,
        _cancel: &CancelToken,
    ) -> CallResult<MembershipState> {
        validate_expiry(desired.expires_at.as_deref())?;
        let options = MemberOptions {
            user_id: Some(desired.user_id),
            access_level: desired.access_level.code(),
            expires_at: desired.expires_at.clone(),
        };
        let member = self
            .client
            .api()
            .add_group_member(&desired.group_id, &options)?;
        Ok(MembershipState::from_member(&desired.group_id, member)?)
    }

    fn key_of(&self, observed: &MembershipState) -> Vec<IdPart> {
        vec![(&observed.group_id).into(), observed.user_id.into()]
    }

    fn fetch(&self, key: &CompositeKey, _cancel: &CancelToken) -> CallResult<MembershipState> {
        let group_id = key.str(0)?;
        let member = self.client.api().get_group_member(group_id, key.int(1)?)?;
        Ok(MembershipState::from_member(group_id, member)?)
    }

    fn diff(
        &self,
        observed: &MembershipState,
        desired: &MembershipSpec,
    ) -> Result<Vec<MemberOptions>> {
        super::ensure_unchanged(KIND, "group_id", &observed.group_id, &desired.group_id)?;
        super::ensure_unchanged(KIND, "user_id", &observed.user_id, &desired.user_id)?;
        validate_expiry(desired.expires_at.as_deref())?;

        if observed.access_level == desired.access_level
            && observed.expires_at == desired.expires_at
        {
            return Ok(Vec::new());
        }
        // An omitted expiry is left alone by the edit call, so send an empty
        // one to clear it.
        Ok(vec![MemberOptions {
            user_id: None,
            access_level: desired.access_level.code(),
            expires_at: Some(desired.expires_at.clone().unwrap_or_default()),
        }])
    }

    fn apply(&self, key: &CompositeKey, change: &MemberOptions) -> CallResult<()> {
        self.client
            .api()
            .edit_group_member(key.str(0)?, key.int(1)?, change)?;
        Ok(())
    }

    fn remove(&self, key: &CompositeKey) -> CallResult<()> {
        self.client
            .api()
            .remove_group_member(key.str(0)?, key.int(1)?)?;
        Ok(())
    }

    fn matches_tracked(&self, tracked: &MembershipState, current: &MembershipState) -> bool {
        tracked.access_level == current.access_level
    }
}
