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
use std::sync::Arc;
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use lazy_static::lazy_static;
use tracing_subscriber::EnvFilter;
use odin_firms::{load_pipeline_config, ClassifiedDetection, FirmsPipelineConfig, DatasetStore, Pipeline, Fallback};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "run the FIRMS pipeline and query the resulting detections by acquisition date")]
struct Args {
    /// filename of the pipeline config (RON)
    #[arg(short,long, default_value = "firms_viirs_la.ron")]
    config: String,

    /// all detections acquired on or before this date (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["from", "to", "range"])]
    up_to: Option<NaiveDate>,

    /// start of inclusive date window (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// end of inclusive date window (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// only report the date range covered by the dataset
    #[arg(long)]
    range: bool,
}

lazy_static! {
    static ref ARGS: Args = Args::parse();
}

#[tokio::main]
async fn main ()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer( std::io::stderr) // keep stdout for results
        .init();

    let config: FirmsPipelineConfig = load_pipeline_config( &ARGS.config)?;
    let store = Arc::new( DatasetStore::new());
    let pipeline = Pipeline::with_http( config, store.clone())?;

    if let Err(failure) = pipeline.run().await {
        // queries are still answered (empty or stale), we just report the failure
        eprintln!("{failure}");
        if failure.fallback == Fallback::NothingToShow {
            eprintln!("no data available");
        }
    }

    if ARGS.range {
        println!("{}", serde_json::to_string_pretty( &store.date_range())?);
        return Ok(())
    }

    let detections: Vec<ClassifiedDetection> = match (ARGS.up_to, ARGS.from, ARGS.to) {
        (Some(date), _, _) => store.detections_up_to(date),
        (None, Some(start), Some(end)) => store.detections_in_range( start, end),
        _ => return Err( anyhow!("need either --up-to, --from/--to or --range"))
    };

    println!("{}", serde_json::to_string_pretty( &detections)?);
    Ok(())
}
