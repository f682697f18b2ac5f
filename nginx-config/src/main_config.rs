//! The main context: modules, error logging, main snippets and, for the
//! commercial build, the `mgmt` block with the files it references.

use crate::errors::{GenerateError, Result};
use crate::file::{File, FileType};
use crate::generator::{
    ExecuteResult, MAIN_INCLUDES_CONFIG_FILE, MGMT_INCLUDES_FILE, SECRETS_FOLDER, UsageReportConfig,
};
use crate::includes::{self, Include};
use crate::templates::{self, Template};
use dataplane::{Configuration, DeploymentContext};
use serde::Serialize;
use tracing::error;

pub(crate) const MAIN_CONFIG_TEMPLATE: Template = Template {
    name: "main.conf",
    source: r#"{% if telemetry_enabled %}
load_module modules/ngx_otel_module.so;

{% endif %}
error_log stderr {{ error_level }};
{% for include in includes %}
include {{ include.name }};
{% endfor %}
"#,
};

pub(crate) const MGMT_CONFIG_TEMPLATE: Template = Template {
    name: "mgmt.conf",
    source: r#"mgmt {
{% if endpoint %}
    usage_report endpoint={{ endpoint }};
{% endif %}
{% if resolver %}
    resolver {{ resolver }};
{% endif %}
    license_token {{ license_token_file }};
    deployment_context {{ deployment_ctx_file }};
{% if skip_verify %}
    ssl_verify off;
{% endif %}
{% if ca_cert_file %}
    ssl_trusted_certificate {{ ca_cert_file }};
{% endif %}
{% if client_ssl_cert_file and client_ssl_key_file %}
    ssl_certificate {{ client_ssl_cert_file }};
    ssl_certificate_key {{ client_ssl_key_file }};
{% endif %}
    enforce_initial_report off;
}
"#,
};

const DEPLOYMENT_CTX_FILE: &str = "/etc/nginx/main-includes/deployment_ctx.json";

#[derive(Serialize)]
struct MainConfig<'a> {
    telemetry_enabled: bool,
    error_level: &'a str,
    includes: &'a [Include],
}

pub(crate) fn execute_main_config(conf: &Configuration) -> Result<Vec<ExecuteResult>> {
    let includes = includes::from_snippets(&conf.main_snippets);

    let main_config = MainConfig {
        telemetry_enabled: conf.telemetry.enabled(),
        error_level: &conf.logging.error_level,
        includes: &includes,
    };

    let mut results = Vec::with_capacity(includes.len() + 1);
    results.push(ExecuteResult::new(
        MAIN_INCLUDES_CONFIG_FILE,
        templates::render(&MAIN_CONFIG_TEMPLATE, &main_config)?,
    ));
    results.extend(includes::execute_results(&includes));

    Ok(results)
}

#[derive(Default, Serialize)]
struct MgmtConf<'a> {
    endpoint: Option<&'a str>,
    resolver: Option<&'a str>,
    license_token_file: String,
    deployment_ctx_file: &'a str,
    ca_cert_file: Option<String>,
    client_ssl_cert_file: Option<String>,
    client_ssl_key_file: Option<String>,
    skip_verify: bool,
}

/// The deployment context file read by the `mgmt` block.
pub fn generate_deployment_context_file(
    ctx: &DeploymentContext,
) -> Result<File, serde_json::Error> {
    Ok(File {
        path: DEPLOYMENT_CTX_FILE.to_string(),
        content: serde_json::to_vec(ctx)?,
        file_type: FileType::Regular,
    })
}

fn secret_file(name: &str, content: &str) -> File {
    File {
        path: format!("{SECRETS_FOLDER}/{name}"),
        content: content.as_bytes().to_vec(),
        file_type: FileType::Secret,
    }
}

/// The `mgmt` block plus the license, TLS material and deployment context it
/// points at. The license is required.
pub(crate) fn generate_mgmt_files(
    conf: &Configuration,
    usage_report: &UsageReportConfig,
) -> Result<Vec<File>> {
    let secrets = &conf.auxiliary_secrets;
    let token = secrets.license_jwt.as_deref().ok_or_else(|| {
        GenerateError::ContractViolation("nginx plus license token is not set".to_string())
    })?;

    let token_file = secret_file("license.jwt", token);
    let mut cfg = MgmtConf {
        endpoint: usage_report.endpoint.as_deref(),
        resolver: usage_report.resolver.as_deref(),
        license_token_file: token_file.path.clone(),
        deployment_ctx_file: DEPLOYMENT_CTX_FILE,
        skip_verify: usage_report.skip_verify,
        ..Default::default()
    };
    let mut files = vec![token_file];

    if let Some(content) = &secrets.ca_cert {
        let ca_file = secret_file("mgmt-ca.crt", content);
        cfg.ca_cert_file = Some(ca_file.path.clone());
        files.push(ca_file);
    }

    if let Some(content) = &secrets.client_ssl_cert {
        let cert_file = secret_file("mgmt-tls.crt", content);
        cfg.client_ssl_cert_file = Some(cert_file.path.clone());
        files.push(cert_file);
    }

    if let Some(content) = &secrets.client_ssl_key {
        let key_file = secret_file("mgmt-tls.key", content);
        cfg.client_ssl_key_file = Some(key_file.path.clone());
        files.push(key_file);
    }

    match generate_deployment_context_file(&conf.deployment_context) {
        Ok(file) => files.push(file),
        Err(err) => error!(error = %err, "Error building deployment context for mgmt block"),
    }

    files.push(File {
        path: MGMT_INCLUDES_FILE.to_string(),
        content: templates::render(&MGMT_CONFIG_TEMPLATE, &cfg)?.into_bytes(),
        file_type: FileType::Regular,
    });

    Ok(files)
}
