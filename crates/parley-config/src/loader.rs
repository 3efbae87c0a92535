use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the backend model list or tool settings are
    /// unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_backend_config()?;
        self.validate_tools_config()?;
        Ok(())
    }

    /// Validate backend model configuration
    fn validate_backend_config(&self) -> anyhow::Result<()> {
        let backend = &self.backend;

        if backend.models.is_empty() {
            anyhow::bail!("backend.models must list at least one model");
        }

        if let Some(ref default_model) = backend.default_model
            && !backend.models.contains(default_model)
        {
            anyhow::bail!("backend.default_model '{default_model}' is not listed in backend.models");
        }

        if backend.request_timeout_seconds == 0 {
            anyhow::bail!("backend.request_timeout_seconds must be greater than 0");
        }

        Ok(())
    }

    /// Validate tool adapter configuration
    fn validate_tools_config(&self) -> anyhow::Result<()> {
        let tools = &self.tools;

        if tools.enforce_timeout && tools.enforce_timeout_ms == 0 {
            anyhow::bail!("tools.enforce_timeout_ms must be greater than 0 when enforce_timeout is enabled");
        }

        for (phrase, target) in &tools.aliases {
            if phrase.trim().is_empty() || target.trim().is_empty() {
                anyhow::bail!("tools.aliases entries must have a non-empty phrase and target");
            }
        }

        for (name, arguments) in &tools.default_arguments {
            if !arguments.is_object() {
                anyhow::bail!("tools.default_arguments.{name} must be a table");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use crate::{Config, LogFormat};

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.backend.models, ["sonnet", "opus", "haiku"]);
        assert!(config.tools.enforce_timeout);
        assert_eq!(config.tools.enforce_timeout_ms, 5_000);
        assert!(config.server.health.enabled);
        assert!(config.telemetry.is_none());
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"
            [server]
            listen_address = "127.0.0.1:9000"

            [backend]
            base_url = "http://backend.internal:7000"
            models = ["sonnet"]
            default_model = "sonnet"

            [tools]
            enforce_timeout_ms = 250
            allow_partial_compliance = true

            [tools.aliases]
            forecast = "get_weather"

            [tools.default_arguments]
            get_weather = { location = "Berlin" }

            [telemetry]
            filter = "parley=debug"
            format = "json"
        "#;

        let config = Config::from_toml_str(raw).unwrap();
        assert_eq!(config.server.listen_address.unwrap().port(), 9000);
        assert_eq!(config.backend.base_url.as_str(), "http://backend.internal:7000/");
        assert_eq!(config.tools.aliases["forecast"], "get_weather");
        assert_eq!(config.tools.default_arguments["get_weather"]["location"], "Berlin");
        assert!(config.tools.allow_partial_compliance);

        let telemetry = config.telemetry.unwrap();
        assert_eq!(telemetry.format, LogFormat::Json);
        assert_eq!(telemetry.filter.as_deref(), Some("parley=debug"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::from_toml_str("[backend]\nbogus = 1").unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn default_model_must_be_advertised() {
        let raw = "[backend]\nmodels = [\"sonnet\"]\ndefault_model = \"opus\"";
        let err = Config::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("default_model"));
    }

    #[test]
    fn empty_model_list_is_rejected() {
        let err = Config::from_toml_str("[backend]\nmodels = []").unwrap_err();
        assert!(err.to_string().contains("at least one model"));
    }

    #[test]
    fn zero_enforcement_budget_is_rejected() {
        let err = Config::from_toml_str("[tools]\nenforce_timeout_ms = 0").unwrap_err();
        assert!(err.to_string().contains("enforce_timeout_ms"));
    }

    #[test]
    fn non_table_default_arguments_are_rejected() {
        let err = Config::from_toml_str("[tools.default_arguments]\nget_weather = \"Berlin\"").unwrap_err();
        assert!(err.to_string().contains("get_weather"));
    }

    #[test]
    fn api_key_is_expanded_from_env() {
        temp_env::with_var("PARLEY_TEST_BACKEND_KEY", Some("sk-test"), || {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "[backend]\napi_key = \"{{{{ env.PARLEY_TEST_BACKEND_KEY }}}}\"").unwrap();

            let config = Config::load(file.path()).unwrap();
            assert_eq!(config.backend.api_key.unwrap().expose_secret(), "sk-test");
        });
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(std::path::Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn bundled_sample_config_loads() {
        temp_env::with_var_unset("PARLEY_BACKEND_URL", || {
            let config = Config::from_toml_str(include_str!("../../../parley.toml")).unwrap();
            assert_eq!(config.backend.base_url.as_str(), "http://127.0.0.1:8787/");
            assert!(config.backend.api_key.is_none());
            assert_eq!(config.tools.aliases["lookup"], "search_web");
            assert_eq!(config.telemetry.unwrap().format, LogFormat::Text);
        });
    }
}
