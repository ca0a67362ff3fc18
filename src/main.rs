use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use component::{
    result::{ResultOptions, ResultPanel},
    stage::TuiStage,
};
use llm::transmitter::{HttpTransport, Transmitter, Transport};
use sys::{Coordinator, Talkers, TypingOptions};

mod component;
mod debug_tool;
mod llm;
mod sys;

#[derive(Debug, clap::Parser)]
struct Args {
    /// project file (toml)
    #[arg(long, short)]
    project_path: Option<String>,

    /// overrides `server_url` in the project file
    #[arg(long, short)]
    server_url: Option<String>,

    /// talk to the built-in dummy server instead of the network
    #[arg(long)]
    offline: bool,

    #[arg(long, default_value = "llama-training.log")]
    log_file: PathBuf,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct Project {
    #[serde(default)]
    server_url: String,
    #[serde(default)]
    transcript_path: String,
    #[serde(default)]
    typing: TypingOptions,
    #[serde(default)]
    talkers: Talkers,
    #[serde(default)]
    result: ResultOptions,
    #[serde(default)]
    offline: OfflineOptions,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct OfflineOptions {
    #[serde(default)]
    turns: u32,
}

impl Project {
    fn fill_default_value(&mut self) {
        if self.server_url.is_empty() {
            self.server_url = llm::DEFAULT_SERVER_URL.to_string();
        }
        if self.transcript_path.is_empty() {
            self.transcript_path = "transcript.toml".to_string();
        }
        if self.offline.turns == 0 {
            self.offline.turns = 3;
        }
        self.typing.fill_default_value();
        self.talkers.fill_default_value();
        self.result.fill_default_value();
    }
}

fn load_project(project_path: Option<&str>) -> anyhow::Result<Project> {
    let mut project: Project = match project_path {
        Some(path) => {
            let project = std::fs::read_to_string(path)
                .map_err(|_| anyhow::anyhow!("project file `{}` not found", path))?;
            toml::from_str(&project)?
        }
        None => Project::default(),
    };
    project.fill_default_value();
    Ok(project)
}

fn init_logger(log_file: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(log_file)
        .map_err(|e| anyhow::anyhow!("log file `{}` err:{e}", log_file.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();
    init_logger(&cli.log_file)?;

    let mut project = load_project(cli.project_path.as_deref())?;
    if let Some(server_url) = cli.server_url {
        project.server_url = server_url;
    }
    log::info!("project: {project:?}");

    // the dummy server answers in-process, no worker thread needed
    let transmitter = if cli.offline {
        let transport: Arc<dyn Transport> =
            Arc::new(debug_tool::DummyTransport::new(project.offline.turns));
        Transmitter::inline(project.server_url.clone(), transport)
    } else {
        Transmitter::new(project.server_url.clone(), Arc::new(HttpTransport::new()?))
    };

    let result = ResultPanel::new(&project.result.template)?;
    let coordinator = Coordinator::new(
        transmitter,
        TuiStage::new(),
        project.typing,
        project.talkers.clone(),
        project.result.delay,
    );

    let app = component::App::new(coordinator, result, PathBuf::from(&project.transcript_path));

    let res = app.run_loop();

    if let Err(err) = &res {
        log::error!("{err:?}");
    }

    res
}
