mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::process;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, SearchArgs};
use dotenv::dotenv;
use indicatif::HumanBytes;
use progress::CliReporter;
use tracing::{error, info};
use vid_duper_core::analysis::deletion::{
    delete_files, delete_group_files, group_deletion_targets, DeletionSummary,
};
use vid_duper_core::hasher::PerceptualHasher;
use vid_duper_core::media::FfmpegFrameSource;
use vid_duper_core::storage::models::{GroupRecord, JobRecord, PairRecord};
use vid_duper_core::storage::Database;
use vid_duper_core::{
    AppConfig, FileMeta, JobOutcome, ScanEngine, ScanResult, Worker, WorkerSettings,
};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match vid_duper_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let db_path = args.db.clone().unwrap_or_else(|| config.db_path.clone());

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    if let Err(err) = run(command, &config, &db_path) {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn open_db(path: &str) -> Result<Database> {
    Database::open(path).with_context(|| format!("opening database {}", path))
}

fn build_worker(config: &AppConfig, db: Database) -> Worker {
    Worker::new(
        db,
        Box::new(FfmpegFrameSource::new(&config.ffmpeg_path, &config.ffprobe_path)),
        Box::new(PerceptualHasher::new()),
        WorkerSettings::from_config(config),
    )
    .with_reporter(Box::new(CliReporter::new()))
}

fn run(command: Commands, config: &AppConfig, db_path: &str) -> Result<()> {
    match command {
        Commands::Enqueue(args) => {
            let db = open_db(db_path)?;
            let params = args.to_params(config);
            let id = db.enqueue_job(&params)?;
            println!("Queued job {}", id.to_string().green());
        }
        Commands::Worker => {
            let mut worker = build_worker(config, open_db(db_path)?);
            let stop = AtomicBool::new(false);
            worker.run(&stop);
        }
        Commands::RunOnce => {
            let mut worker = build_worker(config, open_db(db_path)?);
            match worker.run_once()? {
                None => println!("No queued jobs"),
                Some(JobOutcome::Done {
                    job_id,
                    pairs,
                    groups,
                }) => println!(
                    "Job {} done: {} pairs, {} groups",
                    job_id.to_string().green(),
                    pairs,
                    groups
                ),
                Some(JobOutcome::Failed { job_id, error }) => {
                    println!("Job {} failed: {}", job_id.to_string().red(), error)
                }
                Some(JobOutcome::Discarded { job_id }) => println!(
                    "Job {} was reset while running; results discarded",
                    job_id.to_string().yellow()
                ),
            }
        }
        Commands::Scan(args) => run_scan(&args, config)?,
        Commands::Jobs => {
            let db = open_db(db_path)?;
            let jobs = db.list_jobs()?;
            if jobs.is_empty() {
                println!("No jobs");
            }
            for job in &jobs {
                print_job_line(job);
            }
        }
        Commands::Job { id } => {
            let db = open_db(db_path)?;
            let job = db
                .get_job(id)?
                .ok_or(vid_duper_core::Error::JobNotFound(id))?;
            print_job_line(&job);
            println!("  params:   {}", job.params);
            println!("  created:  {}", job.created_at);
            if let Some(started) = job.started_at {
                println!("  started:  {}", started);
            }
            if let Some(finished) = job.finished_at {
                println!("  finished: {}", finished);
            }
            if let Some(err) = &job.error {
                println!("  error:    {}", err.red());
            }
            if job.status.is_terminal() {
                println!(
                    "  results:  {} pairs, {} groups",
                    db.count_pairs(id)?,
                    db.count_groups(id)?
                );
            } else {
                println!("  results:  {}", "pending".yellow());
            }
        }
        Commands::Pairs { job_id, limit } => {
            let db = open_db(db_path)?;
            let pairs = db.get_pairs(job_id)?;
            let shown = limit.unwrap_or(pairs.len()).min(pairs.len());
            for pair in &pairs[..shown] {
                print_pair(pair);
            }
            println!("{} of {} pairs", shown, pairs.len());
        }
        Commands::Groups { job_id } => {
            let db = open_db(db_path)?;
            let groups = db.get_groups(job_id)?;
            for group in &groups {
                print_group(group);
            }
            println!("{} groups", groups.len());
        }
        Commands::Reset { job_id } => {
            let db = open_db(db_path)?;
            if !db.reset_job(job_id)? {
                bail!(vid_duper_core::Error::JobNotFound(job_id));
            }
            println!("Job {} re-queued", job_id);
        }
        Commands::DeleteJob { job_id } => {
            let db = open_db(db_path)?;
            if !db.delete_job(job_id)? {
                bail!(vid_duper_core::Error::JobNotFound(job_id));
            }
            println!("Job {} deleted", job_id);
        }
        Commands::Delete { paths, yes } => {
            let db = open_db(db_path)?;
            if !yes && !confirm_deletion(&paths)? {
                return Ok(());
            }
            let summary = delete_files(&db, &paths)?;
            print_deletion(&summary);
        }
        Commands::DeleteGroup {
            group_id,
            paths,
            yes,
        } => {
            let db = open_db(db_path)?;
            let group = db
                .get_group(group_id)?
                .ok_or(vid_duper_core::Error::GroupNotFound(group_id))?;
            print_group(&group);
            let explicit = (!paths.is_empty()).then_some(paths.as_slice());
            let target = group_deletion_targets(&group, explicit);
            if target.len() < paths.len() {
                println!(
                    "{}",
                    "Paths that are not members of this group are skipped".yellow()
                );
            }
            if target.is_empty() {
                println!("Nothing to delete");
                return Ok(());
            }
            if !yes && !confirm_deletion(&target)? {
                return Ok(());
            }
            let summary = delete_group_files(&db, group_id, Some(target.as_slice()))?;
            print_deletion(&summary);
        }
        Commands::RequeueStale { minutes } => {
            let db = open_db(db_path)?;
            let ids = db.requeue_stale_jobs(chrono::Duration::minutes(minutes))?;
            if ids.is_empty() {
                println!("No running jobs older than {} minutes", minutes);
            } else {
                println!("Re-queued jobs: {:?}", ids);
            }
        }
        Commands::Defaults => {
            let params = SearchArgs {
                roots: Vec::new(),
                frames: None,
                scale: None,
                threshold: None,
                exts: Vec::new(),
            }
            .to_params(config);
            println!("roots:     {:?}", params.roots);
            println!("frames:    {}", params.frames);
            println!("scale:     {}", params.scale);
            println!("threshold: {}", params.threshold);
            println!("exts:      {}", params.effective_exts().join(" "));
        }
        Commands::PrintConfig => {
            println!("Configuration: {:?}", config);
        }
    }
    Ok(())
}

fn run_scan(args: &SearchArgs, config: &AppConfig) -> Result<()> {
    let params = args.to_params(config);
    params.validate()?;

    let source = FfmpegFrameSource::new(&config.ffmpeg_path, &config.ffprobe_path);
    let hasher = PerceptualHasher::new();
    let engine = ScanEngine::new(&source, &hasher).with_parallelism(config.parallel);
    let reporter = CliReporter::new();
    let result = engine.run_job(&params, &config.ignore_patterns, &reporter)?;

    print_scan_result(&result);
    Ok(())
}

fn print_scan_result(result: &ScanResult) {
    println!();
    for pair in &result.pairs {
        println!(
            "{:.3} {:<24} {}",
            pair.similarity,
            pair.label.to_string().yellow(),
            pair.a.path
        );
        println!("{:30}{}", "", pair.b.path);
    }
    for (i, group) in result.groups.iter().enumerate() {
        println!(
            "\nGroup {} ({} files, {})",
            (i + 1).to_string().cyan(),
            group.count(),
            HumanBytes(group.total_size)
        );
        for member in &group.members {
            print_member(&member.file, member.is_representative);
        }
    }
    info!(
        "Fingerprint: {}, Compare: {}",
        format!("{:.2}s", result.fingerprint_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.compare_duration.as_secs_f64()).green(),
    );
    info!(
        "{} videos, {} usable, {} pairs, {} groups, {} reclaimable",
        result.files_gathered,
        result.rankable_count(),
        format!("{}", result.pairs.len()).red(),
        format!("{}", result.groups.len()).red(),
        format!("{}", HumanBytes(result.reclaimable_bytes())).red(),
    );
}

fn print_job_line(job: &JobRecord) {
    let status = match job.status {
        vid_duper_core::JobStatus::Queued => job.status.to_string().normal(),
        vid_duper_core::JobStatus::Running => job.status.to_string().yellow(),
        vid_duper_core::JobStatus::Done => job.status.to_string().green(),
        vid_duper_core::JobStatus::Error => job.status.to_string().red(),
    };
    println!(
        "#{:<5} {:<8} {}",
        job.id,
        status,
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn describe(file: &FileMeta) -> String {
    let res = file.resolution_label();
    format!(
        "{} ({:.1}s, {}, {})",
        file.path,
        file.duration,
        if res.is_empty() { "?".to_string() } else { res },
        HumanBytes(file.size)
    )
}

fn print_pair(pair: &PairRecord) {
    println!(
        "{:.3} {}",
        pair.similarity,
        pair.label.to_string().yellow()
    );
    println!("      {}", describe(&pair.file_a));
    println!("      {}", describe(&pair.file_b));
}

fn print_member(file: &FileMeta, is_representative: bool) {
    if is_representative {
        println!("  {} {}", "*".green(), describe(file).green());
    } else {
        println!("    {}", describe(file));
    }
}

fn print_group(group: &GroupRecord) {
    println!(
        "Group {} ({} files, {})",
        group.id.to_string().cyan(),
        group.count,
        HumanBytes(group.total_size.max(0) as u64)
    );
    for member in &group.files {
        print_member(&member.file, member.is_representative);
    }
}

fn print_deletion(summary: &DeletionSummary) {
    println!(
        "Deleted {} files, freed {}",
        summary.deleted.len().to_string().green(),
        HumanBytes(summary.bytes_freed)
    );
    for path in &summary.failed {
        println!("  {} {}", "could not delete".red(), path);
    }
    println!(
        "{} groups updated, {} dissolved, {} pairs removed",
        summary.maintenance.groups_updated,
        summary.maintenance.groups_dissolved,
        summary.maintenance.pairs_removed
    );
}

fn confirm_deletion(paths: &[String]) -> io::Result<bool> {
    if paths.is_empty() {
        println!("Nothing to delete");
        return Ok(false);
    }
    for path in paths {
        println!("  {}", path.red());
    }
    prompt_confirm(
        &format!("Delete these {} files from disk?", paths.len()),
        Some(false),
    )
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
