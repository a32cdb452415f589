//! Built-in scenarios for the two booster applications
//!
//! Each preset pins the plugin to the version of the `pom.xml` in the
//! working directory, so they are meant to run from the plugin's own
//! checkout. `--plugin-version` overrides that.

use super::{ScenarioConfig, ScenarioConfigError};

const CONFIGMAP_DEPLOY: &str = r#"
name: configmap-deploy
repository: https://github.com/snowdrop/spring-boot-configmap-booster.git
build:
  descriptor: greeting-service/pom.xml
  goals: fabric8:deploy -DskipTests
plugin:
  version_from: pom.xml
grant_view_role: true
config_entry:
  name: app-config
  data:
    application.properties: "greeting.message: Hello World from a ConfigMap!"
checks:
  - expected: Hello World from a ConfigMap!
"#;

const CONFIGMAP_REDEPLOY: &str = r#"
name: configmap-redeploy
repository: https://github.com/snowdrop/spring-boot-configmap-booster.git
build:
  descriptor: greeting-service/pom.xml
  goals: fabric8:deploy -DskipTests
plugin:
  version_from: pom.xml
grant_view_role: true
config_entry:
  name: app-config
  data:
    application.properties: "greeting.message: Hello World from a ConfigMap!"
checks:
  - expected: Hello World from a ConfigMap!
redeploy:
  add_dependency:
    group_id: org.apache.commons
    artifact_id: commons-lang3
    version: "3.5"
  marker:
    key: configmap-testKey
  config_data:
    application.properties: "greeting.message: Bonjour World from a ConfigMap!"
  checks:
    - expected: Bonjour World from a ConfigMap!
"#;

const HTTP_DEPLOY: &str = r#"
name: http-deploy
repository: https://github.com/openshiftio-vertx-boosters/vertx-http-booster.git
plugin:
  version_from: pom.xml
checks:
  - expected: Hello, World!
  - expected: Hello, vertx!
    query:
      name: vertx
"#;

const HTTP_REDEPLOY: &str = r#"
name: http-redeploy
repository: https://github.com/openshiftio-vertx-boosters/vertx-http-booster.git
plugin:
  version_from: pom.xml
checks:
  - expected: Hello, World!
redeploy:
  add_dependency:
    group_id: org.apache.commons
    artifact_id: commons-lang3
    version: "3.5"
  marker:
    key: vertx-testKey
    value: vertx-testValue
  checks:
    - expected: Hello, World!
    - expected: Hello, vertx!
      query:
        name: vertx
"#;

const PRESETS: &[(&str, &str)] = &[
    ("configmap-deploy", CONFIGMAP_DEPLOY),
    ("configmap-redeploy", CONFIGMAP_REDEPLOY),
    ("http-deploy", HTTP_DEPLOY),
    ("http-redeploy", HTTP_REDEPLOY),
];

pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}

pub fn preset(name: &str) -> Result<ScenarioConfig, ScenarioConfigError> {
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, yaml)| ScenarioConfig::from_yaml(yaml))
        .unwrap_or_else(|| Err(ScenarioConfigError::UnknownPreset(name.to_string())))
}
