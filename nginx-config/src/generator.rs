use crate::errors::Result;
use crate::file::{File, FileType};
use crate::policies::clientsettings::ClientSettingsGenerator;
use crate::policies::observability::ObservabilityGenerator;
use crate::policies::{CompositeGenerator, PolicyGenerator};
use crate::upstreams::UpstreamMap;
use crate::{
    base_http, main_config, maps, servers, split_clients, stream_servers, telemetry, upstreams,
    version,
};
use dataplane::{CertBundle, CertBundleId, Configuration, SslKeyPair, SslKeyPairId};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

pub(crate) const HTTP_FOLDER: &str = "/etc/nginx/conf.d";
pub(crate) const STREAM_FOLDER: &str = "/etc/nginx/stream-conf.d";
/// Files for the main context, such as `load_module` directives.
pub(crate) const MAIN_INCLUDES_FOLDER: &str = "/etc/nginx/main-includes";
pub(crate) const SECRETS_FOLDER: &str = "/etc/nginx/secrets";
pub(crate) const INCLUDES_FOLDER: &str = "/etc/nginx/includes";

pub(crate) const HTTP_CONFIG_FILE: &str = "/etc/nginx/conf.d/http.conf";
pub(crate) const STREAM_CONFIG_FILE: &str = "/etc/nginx/stream-conf.d/stream.conf";
pub(crate) const CONFIG_VERSION_FILE: &str = "/etc/nginx/conf.d/config-version.conf";
/// Match conditions read by the njs module.
pub(crate) const HTTP_MATCH_VARS_FILE: &str = "/etc/nginx/conf.d/matches.json";
pub(crate) const MAIN_INCLUDES_CONFIG_FILE: &str = "/etc/nginx/main-includes/main.conf";
pub(crate) const MGMT_INCLUDES_FILE: &str = "/etc/nginx/main-includes/mgmt.conf";

/// Folders the generated files are written to. The main `/etc/nginx/nginx.conf`
/// is expected to include them.
pub const CONFIG_FOLDERS: &[&str] = &[
    HTTP_FOLDER,
    SECRETS_FOLDER,
    INCLUDES_FOLDER,
    MAIN_INCLUDES_FOLDER,
    STREAM_FOLDER,
];

/// Where the commercial build reports usage to.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct UsageReportConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub resolver: Option<String>,
    #[serde(default)]
    pub skip_verify: bool,
}

/// A fragment of a file. Fragments sharing a destination are concatenated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ExecuteResult {
    pub dest: String,
    pub data: Vec<u8>,
}

impl ExecuteResult {
    pub(crate) fn new(dest: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        ExecuteResult {
            dest: dest.into(),
            data: data.into(),
        }
    }
}

/// Generates nginx configuration files from a [`Configuration`].
///
/// The configuration is expected to be valid. Nothing here re-validates what
/// the builder produced, an invalid configuration makes nginx fail to reload.
pub struct Generator {
    plus: bool,
    usage_report: UsageReportConfig,
}

impl Generator {
    pub fn new(plus: bool, usage_report: UsageReportConfig) -> Self {
        Generator { plus, usage_report }
    }

    pub fn generate(&self, conf: &Configuration) -> Result<Vec<File>> {
        let mut files: Vec<File> = conf
            .ssl_key_pairs
            .iter()
            .map(|(id, pair)| generate_pem(id, pair))
            .collect();

        let policy_generator = CompositeGenerator::new(vec![
            Box::new(ClientSettingsGenerator),
            Box::new(ObservabilityGenerator::new(conf.telemetry.clone())),
        ]);

        files.extend(self.execute_config_templates(conf, &policy_generator)?);

        files.extend(
            conf.cert_bundles
                .iter()
                .map(|(id, bundle)| generate_cert_bundle(id, bundle)),
        );

        debug!(count = files.len(), version = conf.version, "Generated nginx configuration");
        Ok(files)
    }

    fn execute_config_templates(
        &self,
        conf: &Configuration,
        generator: &dyn PolicyGenerator,
    ) -> Result<Vec<File>> {
        let http_upstreams = upstreams::create_upstreams(&conf.upstreams, self.plus);
        let upstream_map = UpstreamMap::new(&http_upstreams);

        let sections = [
            main_config::execute_main_config(conf)?,
            base_http::execute_base_http_config(conf)?,
            servers::execute_servers(conf, generator, &upstream_map, self.plus)?,
            upstreams::execute_upstreams(&http_upstreams)?,
            split_clients::execute_split_clients(conf)?,
            maps::execute_maps(conf)?,
            telemetry::execute_telemetry(conf)?,
            stream_servers::execute_stream_servers(conf, self.plus)?,
            upstreams::execute_stream_upstreams(conf, self.plus)?,
            maps::execute_stream_maps(conf)?,
            version::execute_version(conf)?,
        ];

        let mut file_bytes: IndexMap<String, Vec<u8>> = IndexMap::new();
        for result in sections.into_iter().flatten() {
            file_bytes.entry(result.dest).or_default().extend(result.data);
        }

        let mut files: Vec<File> = file_bytes
            .into_iter()
            .map(|(path, content)| File {
                path,
                content,
                file_type: FileType::Regular,
            })
            .collect();

        if self.plus {
            files.extend(main_config::generate_mgmt_files(conf, &self.usage_report)?);
        }

        Ok(files)
    }
}

fn generate_pem(id: &SslKeyPairId, pair: &SslKeyPair) -> File {
    let mut content = Vec::with_capacity(pair.cert.len() + pair.key.len() + 1);
    content.extend_from_slice(&pair.cert);
    content.push(b'\n');
    content.extend_from_slice(&pair.key);

    File {
        path: pem_file_name(id),
        content,
        file_type: FileType::Secret,
    }
}

pub(crate) fn pem_file_name(id: &SslKeyPairId) -> String {
    format!("{SECRETS_FOLDER}/{id}.pem")
}

fn generate_cert_bundle(id: &CertBundleId, bundle: &CertBundle) -> File {
    File {
        path: cert_bundle_file_name(id),
        content: bundle.clone(),
        file_type: FileType::Regular,
    }
}

pub(crate) fn cert_bundle_file_name(id: &CertBundleId) -> String {
    format!("{SECRETS_FOLDER}/{id}.crt")
}
