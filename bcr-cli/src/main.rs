//! BCR CLI - Command line tool for blue carbon plot ingestion and reports.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "bcr-cli",
    version,
    about = "Blue carbon registry data toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: bcr_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    bcr_cmd::run(cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_report_with_negative_reference_point() {
        let cli = Cli::try_parse_from([
            "bcr-cli",
            "report",
            "--store-uri",
            ":memory:",
            "--json",
            "--ref-lon",
            "-70.5",
            "--radius-m",
            "2500",
        ])
        .unwrap();
        match cli.command {
            bcr_cmd::Command::Report {
                store,
                proximity,
                json,
            } => {
                assert!(json);
                assert_eq!(store.store_uri.as_deref(), Some(":memory:"));
                assert_eq!(proximity.ref_lon, -70.5);
                assert_eq!(proximity.ref_lat, 1.236204);
                assert_eq!(proximity.radius_m, 2500.0);
                assert_eq!(proximity.near_limit, 3);
            }
            _ => panic!("expected report command"),
        }
    }

    #[test]
    fn rejects_out_of_range_proximity_arguments() {
        for args in [
            ["--ref-lat", "95"],
            ["--ref-lon", "-181"],
            ["--radius-m", "-10"],
        ] {
            let mut argv = vec!["bcr-cli", "report", "--store-uri", ":memory:"];
            argv.extend(args);
            assert!(Cli::try_parse_from(argv).is_err(), "accepted {args:?}");
        }
    }

    #[test]
    fn parses_upsert_plots_input() {
        let cli = Cli::try_parse_from(["bcr-cli", "upsert-plots", "-i", "data/plots.csv"]).unwrap();
        match cli.command {
            bcr_cmd::Command::UpsertPlots { input, .. } => {
                assert_eq!(input, std::path::PathBuf::from("data/plots.csv"));
            }
            _ => panic!("expected upsert-plots command"),
        }
    }
}
