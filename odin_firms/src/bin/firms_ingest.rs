/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */
use std::{path::PathBuf, sync::Arc};
use anyhow::Result;
use clap::Parser;
use lazy_static::lazy_static;
use tracing::info;
use tracing_subscriber::EnvFilter;
use odin_firms::{
    load_pipeline_config, FirmsPipelineConfig, DatasetStore, Pipeline,
    export::{OutputFormat, write_dataset}
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "run one FIRMS ingestion and write the classified detections")]
struct Args {
    /// filename of the pipeline config (RON)
    #[arg(short,long, default_value = "firms_viirs_la.ron")]
    config: String,

    /// output file (overrides the config)
    #[arg(short,long)]
    output: Option<PathBuf>,

    /// output format: geojson or csv (overrides the config)
    #[arg(short,long)]
    format: Option<OutputFormat>,
}

lazy_static! {
    static ref ARGS: Args = Args::parse();
}

#[tokio::main]
async fn main ()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))  // use RUST_LOG to set max level
        .init();

    let config: FirmsPipelineConfig = load_pipeline_config( &ARGS.config)?;
    let output = config.output_with( ARGS.output.clone(), ARGS.format);

    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::with_http( config, store.clone())?;

    let report = pipeline.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let (Some(output), Some(dataset)) = (&output, store.current()) {
        write_dataset( &dataset, output)?;
    } else {
        info!("no output file configured");
    }

    if let Some(dataset) = store.current() {
        println!("{}", serde_json::to_string_pretty( &dataset.summary())?);
    }

    Ok(())
}
