use std::process;

use clap::{crate_authors, crate_description, crate_name, crate_version, Arg, ArgAction, Command};
use is_terminal::IsTerminal;
use mlp_core::driver::{self, InputPath, Options, SystemClock};
use mlp_core::mutators::deploy::DeployMode;
use mlp_core::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod kube_backend;

use kube_backend::KubeBackend;

fn main() {
    let cmd = Command::new(crate_name!())
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .subcommand_required(true)
        .subcommands([Command::new("deploy")
            .about("apply a batch of manifests with inventory-tracked pruning")
            .args([
                Arg::new("filename")
                    .short('f')
                    .long("filename")
                    .help("manifest file, directory, or `-` for stdin (repeatable)")
                    .action(ArgAction::Append)
                    .required(true),
                Arg::new("namespace")
                    .short('n')
                    .long("namespace")
                    .help("target namespace; defaults to the current kubeconfig context"),
                Arg::new("deploy_type")
                    .long("deploy-type")
                    .help("deploy_all or smart_deploy")
                    .value_parser(["deploy_all", "smart_deploy"])
                    .default_value("deploy_all"),
                Arg::new("force_deploy_when_no_semver")
                    .long("force-deploy-when-no-semver")
                    .action(ArgAction::SetTrue),
                Arg::new("ensure_namespace")
                    .long("ensure-namespace")
                    .action(ArgAction::Set)
                    .value_parser(clap::value_parser!(bool))
                    .default_value("true"),
                Arg::new("dry_run")
                    .long("dry-run")
                    .action(ArgAction::SetTrue),
                Arg::new("kubeconfig")
                    .long("kubeconfig")
                    .help("path to a kubeconfig file; defaults to the usual kube discovery rules"),
            ])]);

    if let Err(e) = match cmd.get_matches().subcommand() {
        Some(("deploy", m)) => match Args::try_from(m) {
            Ok(args) => startup(args),
            Err(e) => Err(e),
        },
        _ => unreachable!(),
    } {
        eprintln!("{e}");
        process::exit(1);
    }
}

struct Args {
    filenames: Vec<String>,
    namespace: Option<String>,
    deploy_mode: DeployMode,
    force_deploy_when_no_semver: bool,
    ensure_namespace: bool,
    dry_run: bool,
    kubeconfig: Option<String>,
}

impl TryFrom<&clap::ArgMatches> for Args {
    type Error = Error;

    fn try_from(m: &clap::ArgMatches) -> Result<Self> {
        let deploy_mode = match m.get_one::<String>("deploy_type").map(String::as_str) {
            Some("smart_deploy") => DeployMode::SmartDeploy,
            _ => DeployMode::DeployAll,
        };
        Ok(Self {
            filenames: m
                .get_many::<String>("filename")
                .unwrap()
                .map(Clone::clone)
                .collect(),
            namespace: m.get_one::<String>("namespace").cloned(),
            deploy_mode,
            force_deploy_when_no_semver: m.get_flag("force_deploy_when_no_semver"),
            ensure_namespace: *m.get_one::<bool>("ensure_namespace").unwrap(),
            dry_run: m.get_flag("dry_run"),
            kubeconfig: m.get_one::<String>("kubeconfig").cloned(),
        })
    }
}

fn startup(args: Args) -> Result<()> {
    use tokio::{runtime, signal};
    use tracing_subscriber::{filter::EnvFilter, prelude::*};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let collector = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(if std::io::stdout().is_terminal() {
            Some(tracing_subscriber::fmt::layer())
        } else {
            None
        })
        .with(if std::io::stdout().is_terminal() {
            None
        } else {
            Some(tracing_subscriber::fmt::layer().json())
        });
    tracing::subscriber::set_global_default(collector)
        .map_err(|e| Error::Other(anyhow::Error::new(e)))?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build().map_err(Error::Io)?;
    let token = CancellationToken::new();
    let sigstop = token.clone();
    rt.handle().spawn(async move {
        if let Err(err) = signal::ctrl_c().await {
            error!("error reading SIGTERM: {err}");
        }
        sigstop.cancel();
    });
    rt.block_on(run(args, token))
}

async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    let inputs: Vec<InputPath> = args.filenames.iter().map(|s| InputPath::parse(s)).collect();
    let batch = driver::read_inputs(&inputs)?;

    let kube_config = match &args.kubeconfig {
        Some(path) => {
            let kubeconfig = kube::config::Kubeconfig::read_from(path).map_err(|e| Error::Other(e.into()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &kube::config::KubeConfigOptions::default())
                .await
                .map_err(|e| Error::Other(e.into()))?
        }
        None => kube::Config::infer().await.map_err(|e| Error::Other(e.into()))?,
    };
    let client = kube::Client::try_from(kube_config).map_err(Error::Kube)?;
    let namespace = args.namespace.clone().unwrap_or_else(|| client.default_namespace().to_string());

    let backend = KubeBackend::new(client.clone(), namespace.clone()).await?;
    let applier = mlp_core::applier::KubeApplier::new(client);

    let options = Options {
        namespace,
        deploy_mode: args.deploy_mode,
        force_deploy_when_no_semver: args.force_deploy_when_no_semver,
        ensure_namespace: args.ensure_namespace,
        dry_run: args.dry_run,
    };

    info!(objects = batch.len(), "read manifests, starting deploy run");
    let mut stdout = std::io::stdout();
    let report = driver::run(
        &options,
        batch,
        &SystemClock,
        &backend,
        &backend,
        &applier,
        &mut stdout,
        &cancel,
    )
    .await?;

    info!(applied = report.applied.len(), pruned = report.pruned.len(), "deploy run complete");
    Ok(())
}
