use crate::model::{QueryDict, UserContext};
use axum::http::Method;

pub const TO_FIELD_VAR: &str = "_to_field";
pub const IS_POPUP_VAR: &str = "_popup";
pub const SAVE_AS_NEW_VAR: &str = "_saveasnew";
pub const CONTINUE_VAR: &str = "_continue";
pub const ADD_ANOTHER_VAR: &str = "_addanother";

/// One request against an admin screen
#[derive(Debug, Clone)]
pub struct AdminRequest {
    pub method: Method,
    pub get: QueryDict,
    pub post: QueryDict,
    pub user: UserContext,
}

impl AdminRequest {
    pub fn get(user: UserContext, query: QueryDict) -> Self {
        Self {
            method: Method::GET,
            get: query,
            post: QueryDict::new(),
            user,
        }
    }

    pub fn post(user: UserContext, data: QueryDict) -> Self {
        Self {
            method: Method::POST,
            get: QueryDict::new(),
            post: data,
            user,
        }
    }

    pub fn with_query(mut self, query: QueryDict) -> Self {
        self.get = query;
        self
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    /// Look a parameter up in the POST body first, then the query string
    pub fn param(&self, name: &str) -> Option<&str> {
        self.post.get(name).or_else(|| self.get.get(name))
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.post.contains(name) || self.get.contains(name)
    }

    pub fn is_popup(&self) -> bool {
        self.has_param(IS_POPUP_VAR)
    }

    pub fn is_save_as_new(&self) -> bool {
        self.is_post() && self.post.contains(SAVE_AS_NEW_VAR)
    }
}
