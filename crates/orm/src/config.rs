//! Configuration and session factory construction
//!
//! [`Configuration`] collects the connection source, the dialect, the entity
//! types and a string property bag, then builds a [`SessionFactory`].
//! Recognised properties are typed into [`Settings`]; unknown keys are kept
//! but ignored.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backends::{ConnectionProvider, SqliteProvider};
use crate::dialect::{Dialect, DialectKind};
use crate::error::{OrmError, OrmResult};
use crate::metadata::{Entity, EntityRegistry};
use crate::monitor::ExecutionMonitor;
use crate::session::SessionFactory;

/// Property keys understood by [`Settings::from_properties`]
pub mod properties {
    pub const SHOW_SQL: &str = "orm.show_sql";
    pub const SCHEMA_AUTO: &str = "orm.schema.auto";
    pub const RELATIONSHIP_FAILURE_POLICY: &str = "orm.relationship.failure_policy";
    pub const QUOTE_IDENTIFIERS: &str = "orm.quote_identifiers";
    pub const MONITOR_ENABLED: &str = "orm.monitor.enabled";
    pub const SLOW_QUERY_MS: &str = "orm.monitor.slow_query_ms";
}

/// Schema action applied once when the factory is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaAction {
    #[default]
    None,
    Create,
    Recreate,
    Drop,
}

impl FromStr for SchemaAction {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(SchemaAction::None),
            "create" => Ok(SchemaAction::Create),
            "recreate" | "create-drop" => Ok(SchemaAction::Recreate),
            "drop" => Ok(SchemaAction::Drop),
            other => Err(invalid(properties::SCHEMA_AUTO, other)),
        }
    }
}

/// What row mapping does when a relationship cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipPolicy {
    /// Log the failure and return the row with the relationship unset
    #[default]
    BestEffort,
    /// Abort the read with a relationship error
    FailFast,
}

impl FromStr for RelationshipPolicy {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" => Ok(RelationshipPolicy::BestEffort),
            "fail-fast" | "fail_fast" => Ok(RelationshipPolicy::FailFast),
            other => Err(invalid(properties::RELATIONSHIP_FAILURE_POLICY, other)),
        }
    }
}

/// Typed view of the property bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub show_sql: bool,
    pub schema_action: SchemaAction,
    pub relationship_policy: RelationshipPolicy,
    pub quote_identifiers: bool,
    pub monitor_enabled: bool,
    pub slow_query_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_sql: false,
            schema_action: SchemaAction::None,
            relationship_policy: RelationshipPolicy::BestEffort,
            quote_identifiers: false,
            monitor_enabled: true,
            slow_query_ms: None,
        }
    }
}

impl Settings {
    pub fn from_properties(props: &BTreeMap<String, String>) -> OrmResult<Self> {
        let mut settings = Settings::default();
        if let Some(value) = props.get(properties::SHOW_SQL) {
            settings.show_sql = parse_bool(properties::SHOW_SQL, value)?;
        }
        if let Some(value) = props.get(properties::SCHEMA_AUTO) {
            settings.schema_action = value.parse()?;
        }
        if let Some(value) = props.get(properties::RELATIONSHIP_FAILURE_POLICY) {
            settings.relationship_policy = value.parse()?;
        }
        if let Some(value) = props.get(properties::QUOTE_IDENTIFIERS) {
            settings.quote_identifiers = parse_bool(properties::QUOTE_IDENTIFIERS, value)?;
        }
        if let Some(value) = props.get(properties::MONITOR_ENABLED) {
            settings.monitor_enabled = parse_bool(properties::MONITOR_ENABLED, value)?;
        }
        if let Some(value) = props.get(properties::SLOW_QUERY_MS) {
            let millis = value
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid(properties::SLOW_QUERY_MS, value))?;
            settings.slow_query_ms = Some(millis);
        }
        Ok(settings)
    }

    pub fn slow_query_threshold(&self) -> Option<Duration> {
        self.slow_query_ms.map(Duration::from_millis)
    }
}

fn parse_bool(key: &str, value: &str) -> OrmResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> OrmError {
    OrmError::Configuration(format!("invalid value `{}` for property `{}`", value, key))
}

type Registration = fn(&mut EntityRegistry) -> OrmResult<()>;

fn register<T: Entity>(registry: &mut EntityRegistry) -> OrmResult<()> {
    registry.register::<T>().map(|_| ())
}

/// Builder for a [`SessionFactory`]
#[derive(Default)]
pub struct Configuration {
    url: Option<String>,
    dialect: Option<DialectKind>,
    custom_dialect: Option<Arc<dyn Dialect>>,
    provider: Option<Arc<dyn ConnectionProvider>>,
    entities: Vec<(TypeId, Registration)>,
    properties: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection URL; also used to infer the dialect
    pub fn database(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn dialect(mut self, kind: DialectKind) -> Self {
        self.dialect = Some(kind);
        self
    }

    /// Use a dialect implementation outside the built-in four
    pub fn custom_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.custom_dialect = Some(dialect);
        self
    }

    pub fn connection_provider(mut self, provider: Arc<dyn ConnectionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Register an entity type; repeated registrations are ignored
    pub fn add_entity<T: Entity>(mut self) -> Self {
        let type_id = TypeId::of::<T>();
        if !self.entities.iter().any(|(id, _)| *id == type_id) {
            self.entities.push((type_id, register::<T>));
        }
        self
    }

    pub fn set_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn resolve_dialect(&self) -> OrmResult<Arc<dyn Dialect>> {
        if let Some(dialect) = &self.custom_dialect {
            return Ok(Arc::clone(dialect));
        }
        if let Some(kind) = self.dialect {
            return Ok(kind.create());
        }
        match &self.url {
            Some(url) => Ok(DialectKind::from_url(url)?.create()),
            None => Err(OrmError::Configuration(
                "no dialect configured and no connection url to infer one from".to_string(),
            )),
        }
    }

    fn resolve_provider(&self) -> OrmResult<Arc<dyn ConnectionProvider>> {
        if let Some(provider) = &self.provider {
            return Ok(Arc::clone(provider));
        }
        match &self.url {
            Some(url) if DialectKind::from_url(url).ok() == Some(DialectKind::Sqlite) => {
                let provider = SqliteProvider::from_url(url).map_err(OrmError::Connection)?;
                Ok(Arc::new(provider))
            }
            Some(url) => Err(OrmError::Configuration(format!(
                "no connection provider configured for `{}`",
                url
            ))),
            None => Err(OrmError::Configuration(
                "no connection provider or connection url configured".to_string(),
            )),
        }
    }

    /// Validate everything, build the metadata registry and apply the schema action
    pub fn build_session_factory(self) -> OrmResult<SessionFactory> {
        let settings = Settings::from_properties(&self.properties)?;
        let dialect = self.resolve_dialect()?;
        let provider = self.resolve_provider()?;

        let mut registry = EntityRegistry::new();
        for (_, registration) in &self.entities {
            registration(&mut registry)?;
        }

        let monitor = ExecutionMonitor::new(
            settings.monitor_enabled,
            settings.show_sql,
            settings.slow_query_threshold(),
        );

        debug!(
            "Building session factory: dialect={}, provider={}, entities={}",
            dialect.name(),
            provider.describe(),
            registry.len()
        );

        let action = settings.schema_action;
        let factory = SessionFactory::new(
            Arc::new(registry),
            dialect,
            provider,
            Arc::new(monitor),
            settings,
        );
        factory.schema().apply(action)?;

        info!(
            "Session factory ready ({} entities, dialect {})",
            factory.registry().len(),
            factory.dialect().name()
        );
        Ok(factory)
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("url", &self.url)
            .field("provider", &self.provider.as_ref().map(|p| p.describe()))
            .field("dialect", &self.dialect)
            .field("custom_dialect", &self.custom_dialect)
            .field("entities", &self.entities.len())
            .field("properties", &self.properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_settings_from_properties() {
        let settings = Settings::from_properties(&props(&[
            ("orm.show_sql", "true"),
            ("orm.schema.auto", "recreate"),
            ("orm.relationship.failure_policy", "fail-fast"),
            ("orm.monitor.slow_query_ms", "250"),
            ("some.other.key", "ignored"),
        ]))
        .unwrap();

        assert!(settings.show_sql);
        assert_eq!(settings.schema_action, SchemaAction::Recreate);
        assert_eq!(settings.relationship_policy, RelationshipPolicy::FailFast);
        assert_eq!(settings.slow_query_threshold(), Some(Duration::from_millis(250)));
        assert!(settings.monitor_enabled);
    }

    #[test]
    fn test_invalid_property_values_are_rejected() {
        for (key, value) in [
            ("orm.show_sql", "maybe"),
            ("orm.schema.auto", "update"),
            ("orm.relationship.failure_policy", "retry"),
            ("orm.monitor.slow_query_ms", "-5"),
        ] {
            let err = Settings::from_properties(&props(&[(key, value)])).unwrap_err();
            assert!(matches!(err, OrmError::Configuration(_)), "{key}={value}");
        }
    }

    #[test]
    fn test_settings_serialize() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["relationship_policy"], "best-effort");
        assert_eq!(json["schema_action"], "none");
    }

    #[test]
    fn test_missing_dialect_is_a_mapping_category_error() {
        let err = Configuration::new().build_session_factory().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mapping);
    }

    #[test]
    fn test_non_sqlite_url_requires_provider() {
        let err = Configuration::new()
            .database("postgres://localhost/app")
            .build_session_factory()
            .unwrap_err();
        assert!(err.to_string().contains("no connection provider"));
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let err = Configuration::new()
            .database("oracle://localhost/app")
            .build_session_factory()
            .unwrap_err();
        assert!(matches!(err, OrmError::Configuration(_)));
    }

    #[test]
    fn test_debug_summarizes_configuration() {
        let config = Configuration::new()
            .database("sqlite::memory:")
            .set_property("orm.show_sql", "true");
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("sqlite::memory:"));
        assert!(rendered.contains("orm.show_sql"));
        assert!(rendered.contains("provider: None"));
        assert_eq!(config.url(), Some("sqlite::memory:"));
    }
}
