use crate::errors::Result;
use crate::generator::{CONFIG_VERSION_FILE, ExecuteResult};
use crate::templates::{self, Template};
use dataplane::Configuration;
use serde::Serialize;

/// Lets the agent check which configuration version nginx is running. A
/// request to `/version/check` with `X-Expected-Config-Version` fails with a
/// 412 until the expected version is loaded.
pub(crate) const VERSION_TEMPLATE: Template = Template {
    name: "config_version.conf",
    source: r#"map $http_x_expected_config_version $config_version_mismatch {
    "{{ version }}" "";
    default "mismatch";
}

server {
    listen unix:/var/run/nginx/nginx-config-version.sock;
    access_log off;

    location /version {
        return 200 {{ version }};
    }

    location /version/check {
        if ($config_version_mismatch) {
            return 412 "invalid config version";
        }
        return 200 "";
    }
}
"#,
};

#[derive(Serialize)]
struct Version {
    version: u64,
}

pub(crate) fn execute_version(conf: &Configuration) -> Result<Vec<ExecuteResult>> {
    let rendered = templates::render(
        &VERSION_TEMPLATE,
        Version {
            version: conf.version,
        },
    )?;
    Ok(vec![ExecuteResult::new(CONFIG_VERSION_FILE, rendered)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let conf = Configuration {
            version: 42,
            ..Default::default()
        };

        let results = execute_version(&conf).unwrap();
        assert_eq!(results[0].dest, CONFIG_VERSION_FILE);

        let rendered = String::from_utf8(results[0].data.clone()).unwrap();
        assert!(rendered.contains(r#""42" "";"#));
        assert!(rendered.contains("return 200 42;"));
        assert!(rendered.contains(r#"return 412 "invalid config version";"#));
    }
}
