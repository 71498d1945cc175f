#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::style)]

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use proxybench::cli::Args;
use proxybench::event::{EmptyMessageWriter, EventSink, OutputMessageWriter, TEXT_MESSAGE};
use proxybench::options::{PicMode, TestOptions};
use proxybench::report::{byte_count_iec, sort_nodes};
use proxybench::runner::ProfileTest;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let is_verbose = args.verbose;
    tracing_subscriber::fmt()
        .with_max_level(if is_verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let options = TestOptions {
        group_name: args.group.clone(),
        speed_test_mode: args.mode.as_str().into(),
        sort_method: args.sort.clone(),
        concurrency: args.concurrency.max(1),
        timeout: Duration::from_secs(args.timeout.max(8)),
        generate_pic_mode: PicMode::None,
        ..Default::default()
    };

    let links = proxybench::parse_links(&args.input).await?;
    tracing::info!("resolved {} profiles", links.len());

    let writer: Box<dyn proxybench::MessageWriter> = if args.events {
        Box::new(OutputMessageWriter)
    } else {
        Box::new(EmptyMessageWriter)
    };
    let sort_method = options.sort_method.clone();
    let test = ProfileTest::new(EventSink::new(writer, TEXT_MESSAGE), options, links);

    let cancel = CancellationToken::new();
    let admission_guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, aborting admission of new tests");
            admission_guard.cancel();
        }
    });

    let mut nodes = test.run(&cancel).await?;
    sort_nodes(&mut nodes, &sort_method);

    println!(
        "{:<4} {:<24} {:<8} {:>8} {:>12} {:>12} {:>10}",
        "id", "remarks", "proto", "ping", "avg", "max", "traffic"
    );
    for node in &nodes {
        println!(
            "{:<4} {:<24} {:<8} {:>8} {:>12} {:>12} {:>10}",
            node.id,
            node.remarks,
            node.protocol,
            format!("{}ms", node.ping),
            format!("{}/s", byte_count_iec(node.avg_speed)),
            format!("{}/s", byte_count_iec(node.max_speed)),
            byte_count_iec(node.traffic),
        );
    }
    let working = nodes.iter().filter(|n| n.is_ok).count();
    tracing::info!("done: {}/{} profiles working", working, nodes.len());
    Ok(())
}
