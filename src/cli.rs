//! Interface de linha de comando do distfilter baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, report, gallery)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{ExitPolicy, MonitorStrategy};

/// distfilter: lança jobs distribuídos de filtragem de imagens e acompanha o progresso.
#[derive(Debug, Parser)]
#[command(name = "distfilter", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para o arquivo de configuração (padrão: ./distfilter.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Estratégia de progresso aceita pela CLI, mapeada para [`MonitorStrategy`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Conta linhas PROGRESS na saída do processo.
    StreamMarker,
    /// Conta artefatos na pasta de saída.
    FolderPoll,
}

impl From<StrategyArg> for MonitorStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::StreamMarker => MonitorStrategy::StreamMarker,
            StrategyArg::FolderPoll => MonitorStrategy::FolderPoll,
        }
    }
}

/// Política de código de saída aceita pela CLI, mapeada para [`ExitPolicy`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExitPolicyArg {
    /// Finaliza mesmo com código de saída não-zero.
    AlwaysFinalize,
    /// Código não-zero marca o job como falho.
    FailOnNonZero,
}

impl From<ExitPolicyArg> for ExitPolicy {
    fn from(arg: ExitPolicyArg) -> Self {
        match arg {
            ExitPolicyArg::AlwaysFinalize => ExitPolicy::AlwaysFinalize,
            ExitPolicyArg::FailOnNonZero => ExitPolicy::FailOnNonZero,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Processa as imagens da pasta de entrada e acompanha o job até o fim.
    Run {
        /// Pasta com as imagens de entrada.
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Pasta onde o kernel escreve os artefatos.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Tamanho do kernel de desfoque; valores pares sobem para o próximo ímpar.
        #[arg(long, short)]
        kernel: Option<u32>,

        /// Estratégia de acompanhamento do progresso.
        #[arg(long)]
        strategy: Option<StrategyArg>,

        /// O que fazer quando o kernel termina com código não-zero.
        #[arg(long)]
        exit_policy: Option<ExitPolicyArg>,

        /// Emite eventos como linhas JSON em vez da barra de progresso.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Copia o log de resultados para o arquivo de relatório detalhado.
    Report,

    /// Lista os artefatos de uma pasta de saída na ordem da galeria.
    Gallery {
        /// Pasta de saída a listar.
        dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from([
            "distfilter", "run", "--input", "imgs", "--output", "out", "--kernel", "4",
        ]);
        match cli.command {
            Command::Run {
                input,
                output,
                kernel,
                strategy,
                exit_policy,
                json,
            } => {
                assert_eq!(input.unwrap(), PathBuf::from("imgs"));
                assert_eq!(output.unwrap(), PathBuf::from("out"));
                assert_eq!(kernel, Some(4));
                assert!(strategy.is_none());
                assert!(exit_policy.is_none());
                assert!(!json);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_run_allows_missing_folders() {
        let cli = Cli::parse_from(["distfilter", "run"]);
        assert!(matches!(
            cli.command,
            Command::Run {
                input: None,
                output: None,
                ..
            }
        ));
    }

    #[test]
    fn cli_parses_policy_flags() {
        let cli = Cli::parse_from([
            "distfilter",
            "run",
            "-i",
            "a",
            "-o",
            "b",
            "--strategy",
            "folder-poll",
            "--exit-policy",
            "fail-on-non-zero",
            "--json",
        ]);
        match cli.command {
            Command::Run {
                strategy,
                exit_policy,
                json,
                ..
            } => {
                assert_eq!(MonitorStrategy::from(strategy.unwrap()), MonitorStrategy::FolderPoll);
                assert_eq!(ExitPolicy::from(exit_policy.unwrap()), ExitPolicy::FailOnNonZero);
                assert!(json);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["distfilter", "--config", "custom.toml", "--verbose", "report"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Command::Report));
    }

    #[test]
    fn cli_parses_gallery_subcommand() {
        let cli = Cli::parse_from(["distfilter", "gallery", "out"]);
        match cli.command {
            Command::Gallery { dir } => assert_eq!(dir, PathBuf::from("out")),
            _ => panic!("expected Gallery command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
