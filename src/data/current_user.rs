//! `gitlab_current_user`: the account the configured token belongs to.

use crate::client::{Client, read_error};
use labapi::User;
use reconcile::{CancelToken, DataSource, Result};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_current_user";

/// Takes no arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentUserQuery {}

pub struct CurrentUserLookup {
    client: Client,
}

impl CurrentUserLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub bot: bool,
    pub public_email: Option<String>,
    pub namespace_id: Option<i64>,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            bot: user.bot,
            public_email: user.public_email,
            namespace_id: user.namespace_id,
        }
    }
}

impl DataSource for CurrentUserLookup {
    type Query = CurrentUserQuery;
    type Output = CurrentUser;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn read(&self, _query: &CurrentUserQuery, cancel: &CancelToken) -> Result<CurrentUser> {
        cancel.check(format!("read {KIND}"))?;
        let user = self
            .client
            .api()
            .current_user()
            .map_err(|err| read_error(KIND, "self", err))?;
        Ok(user.into())
    }
}
