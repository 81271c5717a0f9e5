use crate::config::LifecycleConfig;
use craftd_common::{CreationRequest, ProvisioningMode};

/// Translates a validated request into the container's `KEY=VALUE` list.
///
/// Modpack credentials are only emitted in managed-modpack mode, whatever
/// the request happens to carry.
pub fn build_environment(request: &CreationRequest, config: &LifecycleConfig) -> Vec<String> {
    let mut env = vec![
        "EULA=TRUE".to_string(),
        format!("SERVER_NAME={}", request.name.trim()),
        format!("MOTD={}", request.motd),
        format!("TYPE={}", request.mode.image_marker()),
        format!("VERSION={}", request.version),
        format!("MAX_PLAYERS={}", request.max_players),
        format!("MEMORY={}M", request.memory_mb),
        format!("JVM_DD_OPTS=fml.readTimeout:{}", config.handshake_timeout_secs),
        format!(
            "ENABLE_AUTOPAUSE={}",
            if config.autopause { "TRUE" } else { "FALSE" }
        ),
    ];

    if request.mode == ProvisioningMode::ManagedModpack {
        env.push(format!(
            "CF_API_KEY={}",
            request.modpack_api_key.as_deref().unwrap_or_default()
        ));
        env.push(format!(
            "CF_PAGE_URL={}",
            request.modpack_url.as_deref().unwrap_or_default()
        ));
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(env: &[String]) -> Vec<&str> {
        env.iter()
            .filter_map(|entry| entry.split_once('=').map(|(k, _)| k))
            .collect()
    }

    #[test]
    fn test_base_mode_entries_in_order() {
        let request = CreationRequest {
            motd: "Welcome".to_string(),
            max_players: 12,
            memory_mb: 2048,
            version: "1.20.1".to_string(),
            ..CreationRequest::new("lobby")
        };
        let env = build_environment(&request, &LifecycleConfig::default());

        assert_eq!(
            env,
            vec![
                "EULA=TRUE",
                "SERVER_NAME=lobby",
                "MOTD=Welcome",
                "TYPE=VANILLA",
                "VERSION=1.20.1",
                "MAX_PLAYERS=12",
                "MEMORY=2048M",
                "JVM_DD_OPTS=fml.readTimeout:180",
                "ENABLE_AUTOPAUSE=FALSE",
            ]
        );
    }

    #[test]
    fn test_modpack_mode_appends_credentials() {
        let request = CreationRequest {
            mode: ProvisioningMode::ManagedModpack,
            modpack_api_key: Some("secret".to_string()),
            modpack_url: Some("https://example.com/pack".to_string()),
            ..CreationRequest::new("pack")
        };
        let env = build_environment(&request, &LifecycleConfig::default());

        assert!(env.contains(&"TYPE=AUTO_CURSEFORGE".to_string()));
        assert_eq!(env[env.len() - 2], "CF_API_KEY=secret");
        assert_eq!(env[env.len() - 1], "CF_PAGE_URL=https://example.com/pack");
    }

    #[test]
    fn test_base_mode_never_leaks_credentials() {
        let request = CreationRequest {
            modpack_api_key: Some("secret".to_string()),
            modpack_url: Some("https://example.com/pack".to_string()),
            ..CreationRequest::new("sneaky")
        };
        let env = build_environment(&request, &LifecycleConfig::default());

        let keys = keys(&env);
        assert!(!keys.contains(&"CF_API_KEY"));
        assert!(!keys.contains(&"CF_PAGE_URL"));
    }

    #[test]
    fn test_config_drives_timeout_and_autopause() {
        let config = LifecycleConfig {
            handshake_timeout_secs: 300,
            autopause: true,
            ..LifecycleConfig::default()
        };
        let env = build_environment(&CreationRequest::new("x"), &config);

        assert!(env.contains(&"JVM_DD_OPTS=fml.readTimeout:300".to_string()));
        assert!(env.contains(&"ENABLE_AUTOPAUSE=TRUE".to_string()));
    }
}
