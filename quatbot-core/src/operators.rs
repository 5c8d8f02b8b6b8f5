// ABOUTME: Operator registry for one room (identities with admin privilege)
// ABOUTME: The bot's own identity is always an operator and the set is never emptied

use crate::traits::looks_like_identity;
use std::collections::HashSet;

/// Why an operator change was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpsError {
    /// Doesn't look like an identity (`@local:domain`)
    MalformedIdentity,
    /// Would remove the last remaining operator
    LastOperator,
    /// The bot cannot de-op itself
    BotIdentity,
    /// The identity was not an operator to begin with
    NotAnOperator,
}

impl std::fmt::Display for OpsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpsError::MalformedIdentity => write!(f, "not a valid user id"),
            OpsError::LastOperator => write!(f, "cannot remove the last operator"),
            OpsError::BotIdentity => write!(f, "the bot cannot be de-opped"),
            OpsError::NotAnOperator => write!(f, "not an operator"),
        }
    }
}

impl std::error::Error for OpsError {}

/// Set of operator identities for a room
#[derive(Debug, Clone)]
pub struct OperatorSet {
    bot_user: String,
    operators: HashSet<String>,
}

impl OperatorSet {
    /// Create the set with the bot's own identity as the first operator
    pub fn new(bot_user: impl Into<String>) -> Self {
        let bot_user = bot_user.into();
        let mut operators = HashSet::new();
        operators.insert(bot_user.clone());
        Self {
            bot_user,
            operators,
        }
    }

    /// Grant (`enable`) or revoke operator status for `identity`
    pub fn set_ops(&mut self, identity: &str, enable: bool) -> Result<(), OpsError> {
        if !looks_like_identity(identity) {
            return Err(OpsError::MalformedIdentity);
        }
        if enable {
            self.operators.insert(identity.to_string());
            return Ok(());
        }
        if self.operators.len() <= 1 {
            return Err(OpsError::LastOperator);
        }
        if identity == self.bot_user {
            return Err(OpsError::BotIdentity);
        }
        if self.operators.remove(identity) {
            Ok(())
        } else {
            Err(OpsError::NotAnOperator)
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        !identity.is_empty() && self.operators.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Operator identities, sorted for stable output
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.operators.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn bot_user(&self) -> &str {
        &self.bot_user
    }
}
