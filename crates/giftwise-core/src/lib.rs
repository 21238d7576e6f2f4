pub mod calendar;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod event;
pub mod filter;
pub mod gift;
pub mod persona;
pub mod reminder;
pub mod render;
pub mod saved;
pub mod session;

use std::ffi::OsString;
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting giftwise CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;
  let session =
    session::SessionStore::resume_or_start(
      &data_dir
    )
    .context(
      "failed to open session store"
    )?;

  let catalog = match cfg
    .get("catalog.location")
  {
    | Some(path) => {
      catalog::Catalog::load(
        &config::expand_tilde(
          Path::new(&path)
        )
      )?
    }
    | None => {
      catalog::Catalog::builtin()?
    }
  };

  let theme = commands::effective_theme(
    &store, &cfg
  )?;
  let renderer =
    render::Renderer::new(&cfg, theme);

  let command = cli
    .command
    .unwrap_or_else(
      commands::default_command
    );

  let app = commands::App {
    store:    &store,
    session,
    cfg:      &cfg,
    renderer: &renderer,
    catalog:  &catalog
  };
  let mut out =
    std::io::stdout().lock();
  commands::dispatch(
    app,
    command,
    Utc::now(),
    &mut out
  )?;

  info!("done");
  Ok(())
}
