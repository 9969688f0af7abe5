use std::iter;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use nfq::{Queue, Verdict};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use nfq_mutator::modification::registry;
use nfq_mutator::{Mod, ModError, Packet, PacketList, parse_mod_spec};

mod monitor;
mod nfq_message;
mod sender;

use crate::{monitor::Monitor, nfq_message::NfqMessage, sender::RawSender};

const QUEUE_MAX_LEN: u32 = 10000;
const BATCH_LIMIT: usize = 10000;
const DEFAULT_MARK: u32 = 0x004d_4f44;

/// Mutates packets queued by netfilter before they leave the host.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// NFQUEUE number to bind
    #[arg(short, long, default_value_t = 0)]
    queue: u16,

    /// Modification to apply, e.g. "duplicate random". Repeat to chain them.
    #[arg(short = 'm', long = "mod", value_name = "SPEC")]
    mods: Vec<String>,

    /// SO_MARK set on re-injected packets
    #[arg(long, default_value_t = DEFAULT_MARK)]
    mark: u32,

    /// Seconds between traffic reports
    #[arg(long, default_value_t = 1)]
    report_interval: u64,

    /// Print the available modifications and exit
    #[arg(long)]
    list_mods: bool,
}

fn make_queue(queue_num: u16) -> Result<Queue> {
    let mut q = Queue::open().context("failed to open netfilter queue")?;
    q.bind(queue_num)
        .with_context(|| format!("failed to bind queue {queue_num}"))?;
    q.set_copy_range(queue_num, 0xFFFF)?;
    q.set_queue_max_len(queue_num, QUEUE_MAX_LEN)?;
    q.set_nonblocking(true);
    Ok(q)
}

fn run_mods(mods: &[Box<dyn Mod>], list: PacketList) -> Result<PacketList, ModError> {
    mods.iter().try_fold(list, |list, m| m.apply(list))
}

/// True when the mods handed back the queued packet as it was.
fn is_untouched(out: &PacketList, original: &Packet) -> bool {
    out.len() == 1
        && out
            .get(0)
            .is_some_and(|p| p.packet == *original && p.delay.is_zero())
}

fn send_list(sender: &RawSender, list: &PacketList, monitor: &mut Monitor) {
    for entry in list {
        if !entry.delay.is_zero() {
            thread::sleep(entry.delay);
        }
        match sender.send(&entry.packet) {
            Ok(()) => monitor.record_sent(entry.packet.len()),
            Err(e) => {
                warn!(error = %e, packet = %entry.packet, "failed to re-inject packet");
                monitor.record_failed();
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    if args.list_mods {
        for entry in registry::entries() {
            println!("{}\n  {}\n", entry.name, entry.usage.replace('\n', "\n  "));
        }
        return Ok(());
    }

    let mods = args
        .mods
        .iter()
        .map(|spec| parse_mod_spec(spec).with_context(|| format!("invalid modification {spec:?}")))
        .collect::<Result<Vec<_>>>()?;
    if mods.is_empty() {
        bail!("no modification given, see --list-mods");
    }
    for m in &mods {
        info!(deterministic = m.is_deterministic(), "using {}", m.describe());
    }

    let sender = RawSender::open(args.mark).context("failed to open raw sockets")?;
    let mut queue = make_queue(args.queue)?;
    let mut monitor = Monitor::new(
        &format!("queue {}", args.queue),
        Duration::from_secs(args.report_interval),
    );
    info!(queue = args.queue, mark = args.mark, "waiting for packets");

    loop {
        let mut working = false;

        for _ in 0..BATCH_LIMIT {
            let Ok(msg) = queue.recv() else {
                break;
            };
            working = true;
            monitor.record_received();

            let msg = NfqMessage::from(msg);
            let original = msg.packet();
            let list: PacketList = iter::once(original.clone()).collect();

            match run_mods(&mods, list) {
                Ok(out) if is_untouched(&out, &original) => {
                    queue.verdict(msg.with_verdict(Verdict::Accept)).ok();
                    monitor.record_accepted();
                }
                Ok(out) => {
                    queue.verdict(msg.with_verdict(Verdict::Drop)).ok();
                    debug!(packets = out.len(), "rewrote {}\n{}", original, out);
                    send_list(&sender, &out, &mut monitor);
                    monitor.record_rewritten();
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        packet = %original,
                        "modification failed, packet accepted as is"
                    );
                    queue.verdict(msg.with_verdict(Verdict::Accept)).ok();
                    monitor.record_failed();
                }
            }
        }

        monitor.check_and_report();

        if !working {
            thread::sleep(Duration::from_micros(100));
        }
    }
}
