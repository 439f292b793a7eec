//! Dispatcher extension points.
//!
//! The request dispatcher raises a [`HookEvent`] at each extension point
//! and runs it through an [`InterceptorChain`]. Interceptors run in
//! registration order; the first one that denies or handles the event
//! stops the chain.
//!
//! # Ordering
//!
//! Every request raises [`HookEvent::BeforeMethod`] before any other event.
//! That event carries the method's privilege check (PROPPATCH needs
//! `write-properties`, ACL needs `write-acl`). [`HookEvent::PropertyUpdate`]
//! and [`HookEvent::UnknownMethod`] change state without a check of their
//! own, so a dispatcher must not raise them for a request whose
//! `BeforeMethod` was denied.
//!
//! # Example
//!
//! ```rust,ignore
//! let chain = InterceptorChain::new().add(control.interceptor());
//!
//! match chain.dispatch(&caller, &HookEvent::BeforeMethod { method: "PUT", uri }).await {
//!     HookOutcome::Continue => { /* run the method */ }
//!     HookOutcome::Deny(err) => { /* report err */ }
//!     HookOutcome::Handled => { /* already answered */ }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use davacl_core::{Ace, Error};

use crate::gate::{AuthorizationGate, Caller, Recursion};
use crate::mutator::AclMutator;
use crate::properties::{names, PropertyValue};

/// Report names served through the report hook.
pub mod reports {
    /// Lists searchable principal properties.
    pub const PRINCIPAL_SEARCH_PROPERTY_SET: &str = "principal-search-property-set";
    /// Searches principals by property.
    pub const PRINCIPAL_PROPERTY_SEARCH: &str = "principal-property-search";
    /// Expands href-valued properties.
    pub const EXPAND_PROPERTY: &str = "expand-property";
}

/// Request depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// The target only.
    Zero,
    /// The target and its immediate children.
    One,
    /// The whole subtree.
    Infinity,
}

/// An extension point raised by the dispatcher.
#[derive(Debug)]
pub enum HookEvent<'a> {
    /// Before any method runs on `uri`.
    BeforeMethod {
        /// HTTP method name.
        method: &'a str,
        /// Target path.
        uri: &'a str,
    },
    /// Before a resource is created at `uri`.
    BeforeBind {
        /// Path of the new resource.
        uri: &'a str,
    },
    /// Before the resource at `uri` is removed.
    BeforeUnbind {
        /// Path of the resource being removed.
        uri: &'a str,
    },
    /// Before a property of `uri` is read.
    BeforePropertyRead {
        /// Resource path.
        uri: &'a str,
        /// Property name.
        property: &'a str,
    },
    /// A request to change a property of `uri`.
    PropertyUpdate {
        /// Resource path.
        uri: &'a str,
        /// Property name.
        property: &'a str,
        /// New value.
        value: &'a PropertyValue,
    },
    /// A REPORT request.
    Report {
        /// Target path.
        uri: &'a str,
        /// Report name.
        name: &'a str,
        /// Request depth.
        depth: Depth,
    },
    /// A method the dispatcher does not implement itself.
    UnknownMethod {
        /// HTTP method name.
        method: &'a str,
        /// Target path.
        uri: &'a str,
        /// Raw request body.
        body: &'a [u8],
    },
}

/// What the dispatcher should do after an interceptor ran.
#[derive(Debug)]
pub enum HookOutcome {
    /// Proceed with the next interceptor, then the operation.
    Continue,
    /// Abort the operation with this error.
    Deny(Error),
    /// The interceptor fully served the event.
    Handled,
}

impl From<davacl_core::Result<()>> for HookOutcome {
    fn from(result: davacl_core::Result<()>) -> Self {
        match result {
            Ok(()) => HookOutcome::Continue,
            Err(e) => HookOutcome::Deny(e),
        }
    }
}

/// One participant in the dispatcher's extension points.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Reacts to `event` on behalf of `caller`.
    async fn intercept(&self, caller: &Caller, event: &HookEvent<'_>) -> HookOutcome;
}

/// Ordered list of interceptors.
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl InterceptorChain {
    /// Create a new empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor.
    #[allow(clippy::should_implement_trait)]
    pub fn add<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs `event` through every interceptor until one denies or handles it.
    pub async fn dispatch(&self, caller: &Caller, event: &HookEvent<'_>) -> HookOutcome {
        for interceptor in &self.interceptors {
            match interceptor.intercept(caller, event).await {
                HookOutcome::Continue => continue,
                outcome => {
                    log::debug!("Interceptor '{}' stopped {event:?}", interceptor.name());
                    return outcome;
                }
            }
        }
        HookOutcome::Continue
    }
}

/// The access-control interceptor.
pub struct AclInterceptor {
    gate: Arc<AuthorizationGate>,
    mutator: Arc<AclMutator>,
}

impl AclInterceptor {
    /// Creates the interceptor.
    pub fn new(gate: Arc<AuthorizationGate>, mutator: Arc<AclMutator>) -> Self {
        Self { gate, mutator }
    }

    async fn report(&self, caller: &Caller, uri: &str, name: &str, depth: Depth) -> HookOutcome {
        match name {
            reports::PRINCIPAL_SEARCH_PROPERTY_SET | reports::PRINCIPAL_PROPERTY_SEARCH
                if depth != Depth::Zero =>
            {
                HookOutcome::Deny(Error::BadRequest(format!(
                    "{name} is only defined for Depth: 0"
                )))
            }
            reports::PRINCIPAL_SEARCH_PROPERTY_SET
            | reports::PRINCIPAL_PROPERTY_SEARCH
            | reports::EXPAND_PROPERTY => self
                .gate
                .check_privileges(caller, uri, &[davacl_core::privileges::READ], Recursion::Target)
                .await
                .into(),
            _ => HookOutcome::Continue,
        }
    }

    async fn acl_method(&self, uri: &str, body: &[u8]) -> HookOutcome {
        let aces: Vec<Ace> = match serde_json::from_slice(body) {
            Ok(aces) => aces,
            Err(e) => {
                return HookOutcome::Deny(Error::BadRequest(format!("Malformed ACL body: {e}")));
            }
        };
        match self.mutator.apply_acl(uri, aces).await {
            Ok(()) => HookOutcome::Handled,
            Err(e) => HookOutcome::Deny(e),
        }
    }
}

#[async_trait]
impl Interceptor for AclInterceptor {
    fn name(&self) -> &str {
        "acl"
    }

    async fn intercept(&self, caller: &Caller, event: &HookEvent<'_>) -> HookOutcome {
        match *event {
            HookEvent::BeforeMethod { method, uri } => {
                self.gate.before_method(caller, method, uri).await.into()
            }
            HookEvent::BeforeBind { uri } => self.gate.before_bind(caller, uri).await.into(),
            HookEvent::BeforeUnbind { uri } => self.gate.before_unbind(caller, uri).await.into(),
            HookEvent::BeforePropertyRead { uri, property } => {
                let privilege = match property {
                    names::ACL => davacl_core::privileges::READ_ACL,
                    names::CURRENT_USER_PRIVILEGE_SET => {
                        davacl_core::privileges::READ_CURRENT_USER_PRIVILEGE_SET
                    }
                    _ => return HookOutcome::Continue,
                };
                self.gate
                    .check_privileges(caller, uri, &[privilege], Recursion::Target)
                    .await
                    .into()
            }
            HookEvent::PropertyUpdate {
                uri,
                property,
                value,
            } => {
                if property != names::GROUP_MEMBER_SET {
                    return HookOutcome::Continue;
                }
                let PropertyValue::Hrefs(members) = value else {
                    return HookOutcome::Deny(Error::BadRequest(
                        "group-member-set takes a list of hrefs".into(),
                    ));
                };
                match self.gate.update_group_member_set(uri, members).await {
                    Ok(()) => HookOutcome::Handled,
                    Err(e) => HookOutcome::Deny(e),
                }
            }
            HookEvent::Report { uri, name, depth } => self.report(caller, uri, name, depth).await,
            HookEvent::UnknownMethod { method, uri, body } => {
                if method.eq_ignore_ascii_case("ACL") {
                    self.acl_method(uri, body).await
                } else {
                    HookOutcome::Continue
                }
            }
        }
    }
}
