#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use vault_agent::approval::ApprovalPipeline;
    use vault_agent::calling_context::CallingContext;
    use vault_agent::config::Config;
    use vault_agent::control::{ControlRequest, ControlResponse};
    use vault_agent::fido2::Fido2Responder;
    use vault_agent::permission::PlatformPermissionGate;
    use vault_agent::pinentry::PinentryGateway;
    use vault_agent::session::{SessionCache, SessionKind};

    #[test]
    fn test_config_yaml_round_trip() {
        let config = Config::for_test();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("bws_access_token"));
        assert!(yaml.contains("bw_secret_id"));
        assert!(yaml.contains("api_url"));

        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_process_manager_stop_is_idempotent() {
        use vault_agent::process_manager::stop_agent;
        let _ = stop_agent();
        let _ = stop_agent();
    }

    #[test]
    fn test_logging_initialization_does_not_panic() {
        use log::LevelFilter;
        use vault_agent::logging::setup_logging;
        let _ = setup_logging(LevelFilter::Info, true);
    }

    #[test]
    fn test_config_file_path() {
        use vault_agent::config::CONFIG_FILE;
        assert_eq!(CONFIG_FILE, ".config/vault-agent/config.yaml");
    }

    /// S2 end-to-end: a cached SSH session short-circuits a second approval
    /// for the exact same `CallingContext`, without consulting pinentry or
    /// biometrics again.
    #[test]
    fn test_cached_ssh_session_avoids_second_prompt() {
        struct PanicsOnCall;
        impl PinentryGateway for PanicsOnCall {
            fn get_password(
                &self,
                _title: &str,
                _prompt: &str,
            ) -> Result<vault_agent::pinentry::Secret, vault_agent::pinentry::PinentryError> {
                panic!("pinentry should not be consulted for a cached session")
            }
            fn get_approval(&self, _title: &str, _message: &str) -> Result<bool, vault_agent::pinentry::PinentryError> {
                panic!("pinentry should not be consulted for a cached session")
            }
        }

        let sessions = Arc::new(SessionCache::new());
        let ctx = CallingContext::unresolved("alice");
        sessions.create(&ctx, SessionKind::Ssh);

        let pipeline = ApprovalPipeline::new(
            sessions,
            Arc::new(PanicsOnCall),
            Arc::new(PlatformPermissionGate::new(Arc::new(PanicsOnCall))),
        );

        let result = pipeline.approve(
            &ctx,
            SessionKind::Ssh,
            "title",
            "message",
            vault_agent::permission::PermissionKind::SSHKey,
            &Config::for_test(),
        );
        assert!(result.is_ok());
    }

    /// S6: with no FIDO2 device attached (true in any CI sandbox), the
    /// responder returns `NoDevices` without ever prompting the user.
    #[test]
    fn test_fido2_responds_no_devices_without_hardware() {
        struct PanicsOnCall;
        impl PinentryGateway for PanicsOnCall {
            fn get_password(
                &self,
                _title: &str,
                _prompt: &str,
            ) -> Result<vault_agent::pinentry::Secret, vault_agent::pinentry::PinentryError> {
                panic!("should not prompt when there are no devices")
            }
            fn get_approval(&self, _title: &str, _message: &str) -> Result<bool, vault_agent::pinentry::PinentryError> {
                panic!("should not prompt when there are no devices")
            }
        }

        let responder = Fido2Responder::new(Arc::new(PanicsOnCall));
        let config = Config::for_test();
        let result = responder.respond("abc", &["Y3JlZA".to_string()], &config);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().to_string(), "no devices found");
    }

    #[test]
    fn test_control_request_response_round_trip_through_json() {
        let req = ControlRequest::GetSshKeysRequest;
        let json = serde_json::to_string(&req).unwrap();
        let back: ControlRequest = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ControlRequest::GetSshKeysRequest));

        let resp = ControlResponse::GetSshKeysResponse {
            keys: vec![vault_agent::control::SshKeySummary {
                name: "work".to_string(),
                fingerprint: "unavailable".to_string(),
            }],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"GetSshKeysResponse\""));
    }
}
