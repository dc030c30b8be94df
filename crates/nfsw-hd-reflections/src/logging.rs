use std::panic;

use color_eyre::config::PanicHook;
use eyre::Result;
use strip_ansi_escapes::Writer;
use tracing::{error, level_filters::LevelFilter};
use tracing_appender::rolling::RollingFileAppender;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};
use windows::Win32::Foundation::HINSTANCE;

use crate::paths::get_dll_dir;

const LOG_ENV_VAR: &str = "NFSWHDR_LOG";
const LOG_FILE_NAME: &str = "NFSWHDReflections.log";

struct StripAnsiWriter((String, String));

impl StripAnsiWriter {
    fn new(dir: &str, filename: &str) -> Self {
        Self((dir.to_owned(), filename.to_owned()))
    }
}

impl<'a> MakeWriter<'a> for StripAnsiWriter {
    type Writer = Writer<RollingFileAppender>;

    fn make_writer(&'a self) -> Self::Writer {
        Writer::new(tracing_appender::rolling::never(&self.0 .0, &self.0 .1))
    }
}

/// Setup logging for the plugin
///
/// The filter comes from `NFSWHDR_LOG` and defaults to `info`
pub fn setup_logging(module: HINSTANCE) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(LOG_ENV_VAR)
        .with_regex(false)
        .from_env()?;

    let stdout_layer = tracing_subscriber::fmt::Layer::default()
        .without_time()
        .with_ansi(true)
        .with_target(false);

    if cfg!(debug_assertions) {
        Registry::default()
            .with(stdout_layer)
            .with(ErrorLayer::default())
            .with(env_filter)
            .init();
    } else {
        // get the file path to `<path_to_my_dll_folder>\`
        let dll_dir = get_dll_dir(module)?;

        // a log writer which also strips ansi, because panic hook unfortunately outputs ansi into the normal stream
        let log_writer = StripAnsiWriter::new(&dll_dir.to_string_lossy(), LOG_FILE_NAME);

        let log_layer = tracing_subscriber::fmt::Layer::default()
            .with_writer(log_writer)
            .with_ansi(false)
            .with_target(false);

        Registry::default()
            .with(stdout_layer)
            .with(log_layer)
            .with(ErrorLayer::default())
            .with(env_filter)
            .init();
    }

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .into_hooks();

    eyre_hook.install()?;
    set_panic_hook(panic_hook);

    Ok(())
}

fn set_panic_hook(hook: PanicHook) {
    // this panic hook makes sure that eyre panic hook gets sent to all tracing layers
    panic::set_hook(Box::new(move |info| {
        let panic = hook.panic_report(info);
        error!("{panic}");
    }))
}
