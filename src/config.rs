//! Configuração do distfilter carregada a partir de `distfilter.toml`.
//!
//! A struct [`DistfilterConfig`] reúne o contrato com o kernel externo
//! (lançador, flags, executável, proporção de artefatos) e as políticas de
//! acompanhamento do job. Valores ausentes no arquivo usam defaults.
//! A variável de ambiente `DISTFILTER_HOSTFILE` tem precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::gallery::GalleryOrder;

/// Arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "distfilter.toml";

/// Estratégia usada para acompanhar o progresso de um job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStrategy {
    /// Conta linhas `PROGRESS` na saída combinada do processo.
    #[default]
    StreamMarker,
    /// Conta artefatos na pasta de saída periodicamente.
    FolderPoll,
}

/// O que fazer quando o processo externo termina com código diferente de zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Finaliza sempre; o código de saída é apenas reportado.
    #[default]
    AlwaysFinalize,
    /// Marca o job como falho e pula a finalização.
    FailOnNonZero,
}

/// Configuração de nível superior carregada de `distfilter.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DistfilterConfig {
    /// Lançador do runtime distribuído.
    #[serde(default = "default_launcher")]
    pub launcher: String,

    /// Flags fixas de seleção de transporte/interface passadas ao lançador.
    #[serde(default = "default_launch_flags")]
    pub launch_flags: Vec<String>,

    /// Arquivo com a lista de hosts. `None` omite `--hostfile`.
    #[serde(default = "default_hostfile")]
    pub hostfile: Option<String>,

    /// Executável do kernel de filtragem.
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Extensão das imagens de entrada contadas como unidades.
    #[serde(default = "default_extension")]
    pub input_extension: String,

    /// Extensão dos artefatos escritos pelo kernel.
    #[serde(default = "default_extension")]
    pub artifact_extension: String,

    /// Artefatos produzidos por unidade de entrada (contrato com o kernel).
    #[serde(default = "default_artifacts_per_unit")]
    pub artifacts_per_unit: usize,

    /// Período de amostragem da estratégia de polling, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub strategy: MonitorStrategy,

    #[serde(default)]
    pub exit_policy: ExitPolicy,

    #[serde(default)]
    pub gallery_order: GalleryOrder,

    /// Log de resultados reescrito pelo kernel ao terminar.
    #[serde(default = "default_results_log")]
    pub results_log: PathBuf,

    /// Destino da cópia do relatório detalhado.
    #[serde(default = "default_detailed_report")]
    pub detailed_report: PathBuf,

    /// Texto exibido quando o log de resultados não existe.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,

    /// Remove artefatos antigos da pasta de saída antes de lançar.
    #[serde(default = "default_purge_stale_artifacts")]
    pub purge_stale_artifacts: bool,

    /// Tamanho de kernel usado quando a CLI não informa um.
    #[serde(default = "default_kernel_size")]
    pub default_kernel_size: u32,
}

fn default_launcher() -> String {
    "mpirun".to_string()
}

// Flags de transporte do cluster: TCP restrito à interface da rede interna.
fn default_launch_flags() -> Vec<String> {
    [
        "--mca",
        "btl_tcp_if_include",
        "enp0s8",
        "--mca",
        "oob_tcp_if_include",
        "enp0s8",
        "--mca",
        "plm_rsh_no_tree_spawn",
        "1",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_hostfile() -> Option<String> {
    Some("/mirror/machinefile".to_string())
}

fn default_executable() -> String {
    "./my_mpi_program".to_string()
}

fn default_extension() -> String {
    "bmp".to_string()
}

fn default_artifacts_per_unit() -> usize {
    6
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_results_log() -> PathBuf {
    PathBuf::from("final_log.txt")
}

fn default_detailed_report() -> PathBuf {
    PathBuf::from("detailed_report.txt")
}

fn default_fallback_message() -> String {
    "final_log.txt was not found".to_string()
}

fn default_purge_stale_artifacts() -> bool {
    true
}

fn default_kernel_size() -> u32 {
    3
}

impl Default for DistfilterConfig {
    fn default() -> Self {
        Self {
            launcher: default_launcher(),
            launch_flags: default_launch_flags(),
            hostfile: default_hostfile(),
            executable: default_executable(),
            input_extension: default_extension(),
            artifact_extension: default_extension(),
            artifacts_per_unit: default_artifacts_per_unit(),
            poll_interval_ms: default_poll_interval_ms(),
            strategy: MonitorStrategy::default(),
            exit_policy: ExitPolicy::default(),
            gallery_order: GalleryOrder::default(),
            results_log: default_results_log(),
            detailed_report: default_detailed_report(),
            fallback_message: default_fallback_message(),
            purge_stale_artifacts: default_purge_stale_artifacts(),
            default_kernel_size: default_kernel_size(),
        }
    }
}

impl DistfilterConfig {
    /// Carrega `distfilter.toml` do diretório atual, ou o caminho informado.
    /// Usa valores padrão se o arquivo padrão não existir; um caminho
    /// explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };

        // Variável de ambiente tem precedência sobre o arquivo para o hostfile.
        if let Ok(hostfile) = std::env::var("DISTFILTER_HOSTFILE")
            && !hostfile.is_empty()
        {
            config.hostfile = Some(hostfile);
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<DistfilterConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Rejeita combinações que tornariam o acompanhamento impossível.
    pub fn validate(&self) -> Result<()> {
        if self.launcher.trim().is_empty() {
            bail!("launcher must not be empty");
        }
        if self.artifacts_per_unit == 0 {
            bail!("artifacts_per_unit must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be at least 1");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
