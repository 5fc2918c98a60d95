//! Stack parameter resolution.
//!
//! Caller-supplied parameter values are merged with template defaults,
//! then two indirection forms are resolved in place:
//!
//! - `[ssm:<name>]` is replaced by the named secret from the parameter
//!   store, decrypted when needed;
//! - the literal `[ask]` triggers a blocking double-entry prompt. This
//!   must only be reached in interactive runs; callers are responsible
//!   for not supplying `[ask]` values in unattended execution.
//!
//! After resolution every template parameter without a default must have
//! a non-empty value, matched case-sensitively first and then
//! case-insensitively.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{CloudError, ParameterError, Result};
use crate::template::TemplateDescriptor;

/// Prefix marking a secret-store reference value.
pub const SECRET_PREFIX: &str = "[ssm:";

/// Sentinel value requesting an interactive prompt.
pub const ASK_SENTINEL: &str = "[ask]";

/// Read access to the secret store.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Looks up a secret by name.
    ///
    /// Returns `Ok(None)` when the secret does not exist; transport
    /// failures are errors so callers can tell the two apart.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    async fn get(&self, name: &str) -> Result<Option<String>>;
}

/// Interactive source for operator-entered parameter values.
pub trait ValuePrompt {
    /// Prompts for a value twice and returns it once both entries match.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal interaction fails.
    fn confirmed_value(&self, name: &str) -> Result<String>;
}

/// Secret store backed by SSM Parameter Store.
#[derive(Debug)]
pub struct SsmSecretStore {
    /// SSM client.
    client: aws_sdk_ssm::Client,
}

impl SsmSecretStore {
    /// Creates a secret store from a shared AWS configuration.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait]
impl SecretStore for SsmSecretStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|p| p.value())
                .map(ToString::to_string)),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_parameter_not_found() {
                    Ok(None)
                } else {
                    Err(CloudError::SecretLookup {
                        name: name.to_string(),
                        message: service_err.to_string(),
                    }
                    .into())
                }
            }
        }
    }
}

/// Double-entry hidden prompt on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl ValuePrompt for TerminalPrompt {
    fn confirmed_value(&self, name: &str) -> Result<String> {
        dialoguer::Password::new()
            .with_prompt(format!("Enter value for '{name}'"))
            .with_confirmation(
                format!("Confirm value for '{name}'"),
                "Values do not match, try again",
            )
            .interact()
            .map_err(|e| {
                ParameterError::PromptFailed {
                    message: e.to_string(),
                }
                .into()
            })
    }
}

/// A fully resolved parameter set.
///
/// Extraneous supplied names are preserved; the required-coverage check
/// only applies to names the template declares.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(transparent)]
pub struct ParameterSet {
    /// Resolved values by parameter name.
    values: BTreeMap<String, String>,
}

impl ParameterSet {
    /// Returns the resolved value for `name`, matching case-sensitively
    /// first and falling back to a case-insensitive match.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.values.get(name) {
            return Some(value);
        }
        self.values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the number of resolved values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no values are resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Builds the `(key, value)` pairs to submit for every parameter the
    /// template declares.
    ///
    /// # Errors
    ///
    /// Returns `ParameterError::MissingParameter` naming the first
    /// declared parameter without a usable value.
    pub fn stack_parameters(
        &self,
        descriptor: &TemplateDescriptor,
    ) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::with_capacity(descriptor.parameters.len());

        for (name, decl) in &descriptor.parameters {
            // An empty value only disqualifies parameters with no default.
            let required = decl.default.is_none();
            let value = self.lookup(name).filter(|v| !required || !v.is_empty());
            match value {
                Some(value) => pairs.push((name.clone(), value.to_string())),
                None => {
                    return Err(ParameterError::MissingParameter { name: name.clone() }.into());
                }
            }
        }

        Ok(pairs)
    }
}

/// Resolver merging template defaults with supplied values.
#[derive(Debug)]
pub struct ParameterResolver<'a, S: SecretStore, P: ValuePrompt> {
    /// Secret store for `[ssm:..]` references.
    secrets: &'a S,
    /// Prompt for `[ask]` values.
    prompt: &'a P,
}

impl<'a, S: SecretStore, P: ValuePrompt> ParameterResolver<'a, S, P> {
    /// Creates a new resolver.
    #[must_use]
    pub const fn new(secrets: &'a S, prompt: &'a P) -> Self {
        Self { secrets, prompt }
    }

    /// Resolves the supplied values against the template's declarations.
    ///
    /// # Errors
    ///
    /// Returns `SecretResolutionFailed` when a referenced secret is
    /// absent and `PromptFailed` when the interactive prompt cannot run.
    pub async fn resolve(
        &self,
        descriptor: &TemplateDescriptor,
        supplied: &BTreeMap<String, String>,
    ) -> Result<ParameterSet> {
        let mut values = supplied.clone();

        // Seed template defaults for anything the caller left unset.
        for (name, decl) in &descriptor.parameters {
            if let Some(default) = &decl.default
                && !values.contains_key(name)
            {
                debug!("seeding default for parameter: {name}");
                values.insert(name.clone(), default.clone());
            }
        }

        for (name, value) in &mut values {
            if let Some(secret_name) = secret_reference(value) {
                info!("resolving parameter {name} from secret store: {secret_name}");
                match self.secrets.get(&secret_name).await? {
                    Some(secret) => *value = secret,
                    None => {
                        warn!("secret {secret_name} not found");
                        return Err(ParameterError::SecretResolutionFailed { name: secret_name }
                            .into());
                    }
                }
            } else if value == ASK_SENTINEL {
                *value = self.prompt.confirmed_value(name)?;
            }
        }

        Ok(ParameterSet { values })
    }
}

/// Extracts the secret name from a `[ssm:<name>]` reference value.
fn secret_reference(value: &str) -> Option<String> {
    value
        .strip_prefix(SECRET_PREFIX)
        .and_then(|rest| rest.strip_suffix(']'))
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ParameterDeclaration, TemplateEncoding};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MapSecrets(BTreeMap<String, String>);

    #[async_trait]
    impl SecretStore for MapSecrets {
        async fn get(&self, name: &str) -> Result<Option<String>> {
            Ok(self.0.get(name).cloned())
        }
    }

    struct CannedPrompt {
        value: String,
        calls: AtomicUsize,
    }

    impl CannedPrompt {
        fn new(value: &str) -> Self {
            Self {
                value: value.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ValuePrompt for CannedPrompt {
        fn confirmed_value(&self, _name: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.clone())
        }
    }

    fn descriptor(declared: &[(&str, Option<&str>)]) -> TemplateDescriptor {
        TemplateDescriptor {
            encoding: TemplateEncoding::Json,
            parameters: declared
                .iter()
                .map(|(name, default)| {
                    (
                        (*name).to_string(),
                        ParameterDeclaration {
                            default: default.map(ToString::to_string),
                        },
                    )
                })
                .collect(),
            body: String::new(),
            path: PathBuf::from("stack.json"),
        }
    }

    fn supplied(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_defaults_seed_unsupplied_parameters() {
        let secrets = MapSecrets(BTreeMap::new());
        let prompt = CannedPrompt::new("unused");
        let resolver = ParameterResolver::new(&secrets, &prompt);

        let descriptor = descriptor(&[("Replicas", Some("2")), ("InstanceType", None)]);
        let set = resolver
            .resolve(&descriptor, &supplied(&[("InstanceType", "t3.micro")]))
            .await
            .unwrap();

        assert_eq!(set.lookup("Replicas"), Some("2"));
        assert_eq!(set.lookup("InstanceType"), Some("t3.micro"));
    }

    #[tokio::test]
    async fn test_supplied_value_wins_over_default() {
        let secrets = MapSecrets(BTreeMap::new());
        let prompt = CannedPrompt::new("unused");
        let resolver = ParameterResolver::new(&secrets, &prompt);

        let descriptor = descriptor(&[("Replicas", Some("2"))]);
        let set = resolver
            .resolve(&descriptor, &supplied(&[("Replicas", "5")]))
            .await
            .unwrap();

        assert_eq!(set.lookup("Replicas"), Some("5"));
    }

    #[tokio::test]
    async fn test_secret_reference_is_resolved() {
        let secrets = MapSecrets(supplied(&[("/prod/db/password", "hunter2")]));
        let prompt = CannedPrompt::new("unused");
        let resolver = ParameterResolver::new(&secrets, &prompt);

        let descriptor = descriptor(&[("DbPassword", None)]);
        let set = resolver
            .resolve(
                &descriptor,
                &supplied(&[("DbPassword", "[ssm:/prod/db/password]")]),
            )
            .await
            .unwrap();

        assert_eq!(set.lookup("DbPassword"), Some("hunter2"));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_resolution() {
        let secrets = MapSecrets(BTreeMap::new());
        let prompt = CannedPrompt::new("unused");
        let resolver = ParameterResolver::new(&secrets, &prompt);

        let descriptor = descriptor(&[("DbPassword", None)]);
        let err = resolver
            .resolve(&descriptor, &supplied(&[("DbPassword", "[ssm:/prod/gone]")]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("/prod/gone"));
    }

    #[tokio::test]
    async fn test_ask_sentinel_prompts_once() {
        let secrets = MapSecrets(BTreeMap::new());
        let prompt = CannedPrompt::new("sekrit");
        let resolver = ParameterResolver::new(&secrets, &prompt);

        let descriptor = descriptor(&[("ApiToken", None)]);
        let set = resolver
            .resolve(&descriptor, &supplied(&[("ApiToken", "[ask]")]))
            .await
            .unwrap();

        assert_eq!(set.lookup("ApiToken"), Some("sekrit"));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_required_parameter() {
        let secrets = MapSecrets(BTreeMap::new());
        let prompt = CannedPrompt::new("unused");
        let resolver = ParameterResolver::new(&secrets, &prompt);

        let descriptor = descriptor(&[("InstanceType", None)]);
        let set = resolver
            .resolve(&descriptor, &BTreeMap::new())
            .await
            .unwrap();

        let err = set.stack_parameters(&descriptor).unwrap_err();
        assert!(err.to_string().contains("InstanceType"));
    }

    #[tokio::test]
    async fn test_case_insensitive_fallback() {
        let secrets = MapSecrets(BTreeMap::new());
        let prompt = CannedPrompt::new("unused");
        let resolver = ParameterResolver::new(&secrets, &prompt);

        let descriptor = descriptor(&[("InstanceType", None)]);
        let set = resolver
            .resolve(&descriptor, &supplied(&[("instancetype", "t3.small")]))
            .await
            .unwrap();

        let pairs = set.stack_parameters(&descriptor).unwrap();
        assert_eq!(
            pairs,
            vec![(String::from("InstanceType"), String::from("t3.small"))]
        );
    }

    #[tokio::test]
    async fn test_extraneous_supplied_names_preserved() {
        let secrets = MapSecrets(BTreeMap::new());
        let prompt = CannedPrompt::new("unused");
        let resolver = ParameterResolver::new(&secrets, &prompt);

        let descriptor = descriptor(&[("InstanceType", None)]);
        let set = resolver
            .resolve(
                &descriptor,
                &supplied(&[("InstanceType", "t3.micro"), ("Unrelated", "kept")]),
            )
            .await
            .unwrap();

        assert_eq!(set.lookup("Unrelated"), Some("kept"));

        // Only declared names go to the control plane.
        let pairs = set.stack_parameters(&descriptor).unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_secret_reference_parsing() {
        assert_eq!(
            secret_reference("[ssm:/a/b]").as_deref(),
            Some("/a/b")
        );
        assert_eq!(secret_reference("[ssm:/a/b"), None);
        assert_eq!(secret_reference("plain"), None);
    }
}
