// Drive a file-backed `u64` queue from the command line, one role per process.
//
//   spsc-shm produce --path /dev/shm/q --capacity 1024 --reset --count 10
//   spsc-shm consume --path /dev/shm/q --capacity 1024 --count 10

use std::{fs::File, io::Read, path::PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use argh::FromArgs;
use crossbeam::utils::Backoff;
use mmap_spsc::{
   spsc::{CACHE_LINE, HEADER_SIZE},
   Consumer, Producer,
};

#[derive(Debug, FromArgs)]
/// Shared-memory SPSC queue driver
#[argh(help_triggers("--help"))]
struct Args {
   #[argh(subcommand)]
   cmd: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
   Produce(ProduceArgs),
   Consume(ConsumeArgs),
   Inspect(InspectArgs),
}

#[derive(Debug, FromArgs)]
/// push sequential integers into the queue
#[argh(subcommand, name = "produce")]
struct ProduceArgs {
   /// backing file of the queue
   #[argh(option)]
   path: PathBuf,
   /// usable slots of the queue
   #[argh(option)]
   capacity: usize,
   /// create the file and empty the queue first
   #[argh(switch)]
   reset: bool,
   /// number of values to push
   #[argh(option)]
   count: u64,
   /// first value pushed
   #[argh(option, default = "0")]
   start: u64,
}

#[derive(Debug, FromArgs)]
/// pop integers from the queue and print them
#[argh(subcommand, name = "consume")]
struct ConsumeArgs {
   /// backing file of the queue
   #[argh(option)]
   path: PathBuf,
   /// usable slots of the queue
   #[argh(option)]
   capacity: usize,
   /// number of values to pop
   #[argh(option)]
   count: u64,
   /// print only the sum instead of every value
   #[argh(switch)]
   quiet: bool,
}

#[derive(Debug, FromArgs)]
/// print the cursors of the queue
#[argh(subcommand, name = "inspect")]
struct InspectArgs {
   /// backing file of the queue
   #[argh(option)]
   path: PathBuf,
   /// usable slots of the queue
   #[argh(option)]
   capacity: usize,
}

pub fn main() -> Result<()> {
   let args = argh::from_env::<Args>();
   tracing_subscriber::fmt()
      .with_thread_names(true)
      .without_time()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .init();

   match args.cmd {
      Command::Produce(a) => produce(a),
      Command::Consume(a) => consume(a),
      Command::Inspect(a) => inspect(a),
   }
}

fn produce(args: ProduceArgs) -> Result<()> {
   let end = args
      .start
      .checked_add(args.count)
      .ok_or_else(|| anyhow!("--start {} plus --count {} overflows u64", args.start, args.count))?;
   let mut tx = Producer::<u64>::attach(&args.path, args.capacity, args.reset)
      .with_context(|| format!("attaching producer to {}", args.path.display()))?;

   let backoff = Backoff::new();
   for value in args.start..end {
      let mut item = value;
      while let Err(full) = tx.push(item) {
         item = full.into_inner();
         backoff.snooze();
      }
      backoff.reset();
   }
   tx.flush().context("syncing queue file")?;
   tracing::info!(count = args.count, live = tx.size_guess(), "producer done");
   Ok(())
}

fn consume(args: ConsumeArgs) -> Result<()> {
   let mut rx = Consumer::<u64>::attach(&args.path, args.capacity, false)
      .with_context(|| format!("attaching consumer to {}", args.path.display()))?;

   let backoff = Backoff::new();
   let mut sum = 0u64;
   for _ in 0..args.count {
      let value = loop {
         match rx.pop() {
            Some(v) => break v,
            None => backoff.snooze(),
         }
      };
      backoff.reset();
      sum = sum.wrapping_add(value);
      if !args.quiet {
         println!("{value}");
      }
   }
   println!("sum {sum}");
   Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
   // Plain file read: takes no role, so it works next to live handles.
   let mut header = [0u8; HEADER_SIZE];
   File::open(&args.path)
      .and_then(|mut f| f.read_exact(&mut header))
      .with_context(|| format!("reading header of {}", args.path.display()))?;

   const WORD: usize = std::mem::size_of::<usize>();
   let cursor = |offset: usize| {
      let mut bytes = [0u8; WORD];
      bytes.copy_from_slice(&header[offset..offset + WORD]);
      usize::from_ne_bytes(bytes)
   };
   let (write, read) = (cursor(0), cursor(CACHE_LINE));
   let ring_len = args
      .capacity
      .checked_add(1)
      .ok_or_else(|| anyhow!("--capacity {} is too large", args.capacity))?;
   if write >= ring_len || read >= ring_len {
      bail!("cursors write={write} read={read} do not fit capacity {}", args.capacity);
   }

   println!("write {write}");
   println!("read  {read}");
   println!("live  {}", (write + ring_len - read) % ring_len);
   Ok(())
}
