//! Function configuration: triggers, execution options, and validation.

use crate::duration::parse_duration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default retry count for a function
pub const DEFAULT_RETRIES: u32 = 3;

const MAX_CONCURRENCY_ENTRIES: usize = 2;
const MIN_DEBOUNCE: Duration = Duration::from_secs(1);
const MAX_DEBOUNCE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const MAX_PRIORITY_EXPRESSION_LEN: usize = 1000;

/// Function trigger: an event subscription or a cron schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Trigger {
    Event {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expression: Option<String>,
    },
    Cron {
        cron: String,
    },
}

impl Trigger {
    /// Create an event trigger
    pub fn event(name: impl Into<String>) -> Self {
        Self::Event {
            event: name.into(),
            expression: None,
        }
    }

    /// Create an event trigger with a match expression
    pub fn event_if(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::Event {
            event: name.into(),
            expression: Some(expression.into()),
        }
    }

    /// Create a cron trigger
    pub fn cron(expression: impl Into<String>) -> Self {
        Self::Cron {
            cron: expression.into(),
        }
    }
}

/// Scope of a concurrency limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyScope {
    Fn,
    Env,
    Account,
}

impl FromStr for ConcurrencyScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fn" => Ok(Self::Fn),
            "env" => Ok(Self::Env),
            "account" => Ok(Self::Account),
            other => Err(Error::validation(
                "concurrency.scope",
                format!("'{other}' is not one of fn, env, account"),
            )),
        }
    }
}

impl fmt::Display for ConcurrencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fn => "fn",
            Self::Env => "env",
            Self::Account => "account",
        };
        write!(f, "{label}")
    }
}

/// Concurrency limit for a function; `limit == 0` means unlimited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concurrency {
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ConcurrencyScope>,
}

impl Concurrency {
    /// Create a concurrency limit
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            key: None,
            scope: None,
        }
    }

    /// Set the concurrency key expression
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the scope
    pub fn scope(mut self, scope: ConcurrencyScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Debounce configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debounce {
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl Debounce {
    /// Create a debounce over the given `<int><unit>` period
    pub fn new(period: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            key: None,
            timeout: None,
        }
    }

    /// Set the debounce key expression
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the maximum time a debounce may keep deferring
    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    fn validate(&self) -> Result<()> {
        validate_debounce_duration("debounce.period", &self.period)?;
        if let Some(timeout) = &self.timeout {
            validate_debounce_duration("debounce.timeout", timeout)?;
        }
        Ok(())
    }
}

fn validate_debounce_duration(field: &str, text: &str) -> Result<()> {
    let duration =
        parse_duration(text).map_err(|err| Error::validation(field, err.to_string()))?;
    if duration < MIN_DEBOUNCE || duration > MAX_DEBOUNCE {
        return Err(Error::validation(
            field,
            format!("'{text}' is outside the allowed range of 1s to 7d"),
        ));
    }
    Ok(())
}

/// Run priority, evaluated server-side to an integer in [-600, 600]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    pub run: String,
}

impl Priority {
    /// Create a priority from a run expression
    pub fn new(run: impl Into<String>) -> Self {
        Self { run: run.into() }
    }

    fn validate(&self) -> Result<()> {
        if self.run.is_empty() {
            return Err(Error::validation(
                "priority.run",
                "expression cannot be empty",
            ));
        }
        if self.run.len() > MAX_PRIORITY_EXPRESSION_LEN {
            return Err(Error::validation(
                "priority.run",
                format!("expression exceeds {MAX_PRIORITY_EXPRESSION_LEN} characters"),
            ));
        }
        if let Some(bad) = self.run.chars().find(|c| !is_expression_char(*c)) {
            return Err(Error::validation(
                "priority.run",
                format!("expression contains unsupported character '{bad}'"),
            ));
        }
        Ok(())
    }
}

fn is_expression_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_ascii_whitespace()
        || "_.-'\"=!<>&|?:()+*/%,[]".contains(c)
}

/// What to do when a run of the function is already in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingletonMode {
    Skip,
    Cancel,
}

impl FromStr for SingletonMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(Self::Skip),
            "cancel" => Ok(Self::Cancel),
            other => Err(Error::validation(
                "singleton.mode",
                format!("'{other}' is not one of skip, cancel"),
            )),
        }
    }
}

/// Singleton execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Singleton {
    pub mode: SingletonMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Singleton {
    /// Create a singleton configuration
    pub fn new(mode: SingletonMode) -> Self {
        Self { mode, key: None }
    }

    /// Set the singleton key expression
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Configuration for a servable function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Unique function identifier within the app
    pub id: String,
    /// Human-readable display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description shown in the orchestrator UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Triggers; at least one is required
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Retry attempts after the first failure
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Concurrency limits, at most two entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concurrency: Vec<Concurrency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce: Option<Debounce>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub singleton: Option<Singleton>,
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

impl FunctionConfig {
    /// Create a new function configuration
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            triggers: Vec::new(),
            retries: DEFAULT_RETRIES,
            concurrency: Vec::new(),
            debounce: None,
            priority: None,
            singleton: None,
        }
    }

    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a trigger
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Set the retry count
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Add a concurrency limit
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency.push(concurrency);
        self
    }

    /// Set the debounce configuration
    pub fn debounce(mut self, debounce: Debounce) -> Self {
        self.debounce = Some(debounce);
        self
    }

    /// Set the run priority
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the singleton configuration
    pub fn singleton(mut self, singleton: Singleton) -> Self {
        self.singleton = Some(singleton);
        self
    }

    /// The orchestrator-visible identifier for this function
    pub fn composite_id(&self, app_id: &str) -> String {
        format!("{app_id}-{}", self.id)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation("id", "function id cannot be empty"));
        }

        if self.triggers.is_empty() {
            return Err(Error::validation(
                "triggers",
                "function requires at least one trigger",
            ));
        }

        if self.concurrency.len() > MAX_CONCURRENCY_ENTRIES {
            return Err(Error::validation(
                "concurrency",
                format!("at most {MAX_CONCURRENCY_ENTRIES} concurrency entries are allowed"),
            ));
        }

        if let Some(debounce) = &self.debounce {
            debounce.validate()?;
        }

        if let Some(priority) = &self.priority {
            priority.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn valid_config() -> FunctionConfig {
        FunctionConfig::new("send-welcome").trigger(Trigger::event("user.created"))
    }

    #[test]
    fn test_trigger_event_wire_form() {
        let fixture = Trigger::event("user.created");
        let actual = serde_json::to_value(&fixture).unwrap();
        let expected = json!({"event": "user.created"});
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_trigger_event_with_expression_wire_form() {
        let fixture = Trigger::event_if("user.created", "event.data.plan == 'pro'");
        let actual = serde_json::to_value(&fixture).unwrap();
        let expected = json!({
            "event": "user.created",
            "expression": "event.data.plan == 'pro'"
        });
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_trigger_cron_wire_form() {
        let fixture = Trigger::cron("0 9 * * 1");
        let actual = serde_json::to_value(&fixture).unwrap();
        let expected = json!({"cron": "0 9 * * 1"});
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_trigger_deserialization_picks_variant() {
        let actual: Trigger = serde_json::from_value(json!({"cron": "* * * * *"})).unwrap();
        assert!(matches!(actual, Trigger::Cron { .. }));

        let actual: Trigger = serde_json::from_value(json!({"event": "x"})).unwrap();
        assert!(matches!(actual, Trigger::Event { .. }));
    }

    #[test]
    fn test_concurrency_scope_wire_values() {
        assert_eq!(
            serde_json::to_value(ConcurrencyScope::Fn).unwrap(),
            json!("fn")
        );
        assert_eq!(
            serde_json::to_value(ConcurrencyScope::Env).unwrap(),
            json!("env")
        );
        assert_eq!(
            serde_json::to_value(ConcurrencyScope::Account).unwrap(),
            json!("account")
        );
    }

    #[test]
    fn test_concurrency_scope_from_str_rejects_unknown() {
        let actual = ConcurrencyScope::from_str("region");
        assert!(actual.is_err());
    }

    #[test]
    fn test_concurrency_rejects_negative_limit_on_deserialize() {
        let actual = serde_json::from_value::<Concurrency>(json!({"limit": -1}));
        assert!(actual.is_err());
    }

    #[test]
    fn test_singleton_mode_from_str() {
        assert_eq!(
            SingletonMode::from_str("skip").unwrap(),
            SingletonMode::Skip
        );
        assert_eq!(
            SingletonMode::from_str("cancel").unwrap(),
            SingletonMode::Cancel
        );
        assert!(SingletonMode::from_str("replace").is_err());
    }

    #[test]
    fn test_function_config_defaults() {
        let fixture = valid_config();
        assert_eq!(fixture.retries, 3);
        assert!(fixture.concurrency.is_empty());
        assert!(fixture.validate().is_ok());
    }

    #[test]
    fn test_composite_id() {
        let fixture = valid_config();
        let actual = fixture.composite_id("my-app");
        let expected = "my-app-send-welcome";
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_validate_requires_trigger() {
        let fixture = FunctionConfig::new("no-triggers");
        let actual = fixture.validate();
        assert!(actual.is_err());
    }

    #[test]
    fn test_validate_rejects_three_concurrency_entries() {
        let fixture = valid_config()
            .concurrency(Concurrency::new(1))
            .concurrency(Concurrency::new(2))
            .concurrency(Concurrency::new(3));
        let actual = fixture.validate();
        assert!(actual.is_err());
    }

    #[test]
    fn test_validate_debounce_range() {
        assert!(valid_config()
            .debounce(Debounce::new("1s"))
            .validate()
            .is_ok());
        assert!(valid_config()
            .debounce(Debounce::new("7d"))
            .validate()
            .is_ok());
        assert!(valid_config()
            .debounce(Debounce::new("0s"))
            .validate()
            .is_err());
        assert!(valid_config()
            .debounce(Debounce::new("8d"))
            .validate()
            .is_err());
        assert!(valid_config()
            .debounce(Debounce::new("never"))
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_debounce_timeout() {
        let fixture = valid_config().debounce(Debounce::new("30s").timeout("10d"));
        let actual = fixture.validate();
        assert!(actual.is_err());
    }

    #[test]
    fn test_validate_priority_expression() {
        assert!(valid_config()
            .priority(Priority::new("event.data.plan == 'enterprise' ? 120 : 0"))
            .validate()
            .is_ok());
        assert!(valid_config()
            .priority(Priority::new(""))
            .validate()
            .is_err());
        assert!(valid_config()
            .priority(Priority::new("x".repeat(1001)))
            .validate()
            .is_err());
        assert!(valid_config()
            .priority(Priority::new("event.data.note == `tick`"))
            .validate()
            .is_err());
    }

    #[test]
    fn test_function_config_wire_form_skips_unset_options() {
        let fixture = valid_config();
        let actual = serde_json::to_value(&fixture).unwrap();
        assert!(actual.get("debounce").is_none());
        assert!(actual.get("priority").is_none());
        assert!(actual.get("singleton").is_none());
        assert!(actual.get("concurrency").is_none());
    }
}
