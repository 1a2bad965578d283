use std::path::PathBuf;

use clap::{Parser, Subcommand};
use triage_config::Provider;

/// Suggests which medical specialist to see for a symptom description.
///
/// Guidance only; not a diagnosis.
#[derive(Debug, Parser)]
#[command(name = "triage", version, about)]
pub struct Cli {
    /// Configuration file (YAML). Defaults to ./triage.yaml when present.
    #[arg(long, global = true, env = "TRIAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured provider (gemini, openai, ollama).
    #[arg(long, global = true)]
    pub provider: Option<Provider>,

    /// Override the configured model.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Mirror debug logs to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive consultations (the default).
    Chat,
    /// One consultation for the given symptoms.
    Ask {
        /// Symptom description; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        symptoms: Vec<String>,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run the built-in reference cases.
    Samples {
        /// List the cases without running them.
        #[arg(long)]
        list: bool,
        /// Run the four-case quick subset.
        #[arg(long, conflicts_with = "name")]
        quick: bool,
        /// Run only the named case (repeatable).
        #[arg(long)]
        name: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_chat() {
        let cli = Cli::try_parse_from(["triage"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn ask_joins_words_and_takes_global_flags() {
        let cli = Cli::try_parse_from([
            "triage", "ask", "sore", "throat", "--json", "--provider", "ollama",
        ])
        .unwrap();
        assert_eq!(cli.provider, Some(Provider::Ollama));
        match cli.command {
            Some(Command::Ask { symptoms, json }) => {
                assert_eq!(symptoms.join(" "), "sore throat");
                assert!(json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["triage", "--provider", "bard"]).is_err());
    }

    #[test]
    fn quick_and_name_conflict() {
        assert!(
            Cli::try_parse_from(["triage", "samples", "--quick", "--name", "Eye Infection"])
                .is_err()
        );
    }
}
