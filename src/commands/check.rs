//! System check command implementation.

use herakles_proc_top::{OsReader, ProcFs};

use crate::config::{validate_effective_config, Config};

/// Checks that the proc filesystem and user database are readable.
///
/// Returns `Ok(false)` when any check failed so the caller can pick the exit code.
pub fn command_check(proc: bool, users: bool, all: bool, config: &Config) -> anyhow::Result<bool> {
    println!("🔍 Herakles Proc Top - System Check");
    println!("===================================");

    let reader = config.proc_fs();
    let mut all_ok = true;

    // Without a selection, everything is checked
    let everything = all || (!proc && !users);

    if proc || everything {
        all_ok &= check_proc(&reader);
    }

    if users || everything {
        all_ok &= check_users(&reader);
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(()) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {e}");
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
    } else {
        println!("   ❌ Some checks failed - please review warnings");
    }
    Ok(all_ok)
}

fn check_proc(reader: &ProcFs) -> bool {
    let mut ok = true;
    let root = reader.proc_root();

    println!("\n📁 Checking {} filesystem...", root.display());
    if !root.is_dir() {
        println!("   ❌ {} not found", root.display());
        return false;
    }
    println!("   ✅ {} accessible", root.display());

    let cpu = reader.cpu_counters();
    if cpu.total == 0 {
        println!("   ❌ No CPU counters in {}/stat", root.display());
        ok = false;
    } else {
        println!(
            "   ✅ CPU counters readable: {} active / {} total ticks",
            cpu.active, cpu.total
        );
    }

    let memory = reader.memory_counters();
    if memory.total == 0 {
        println!("   ❌ No memory counters in {}/meminfo", root.display());
        ok = false;
    } else {
        println!(
            "   ✅ Memory counters readable: {} kB total, {:.1}% used",
            memory.total,
            memory.used_fraction() * 100.0
        );
    }

    let pids = reader.live_pids();
    if pids.is_empty() {
        println!("   ❌ Cannot list any process directories");
        return false;
    }
    println!("   ✅ Found {} process directories", pids.len());

    // Prefer our own pid; a custom proc root may not contain it
    let own = std::process::id() as i32;
    let probe = if reader.process_directory_exists(own) {
        own
    } else {
        pids[0]
    };

    if reader.process_active_ticks(probe) == 0 && reader.process_start_ticks(probe) == 0 {
        println!("   ⚠️  stat of pid {probe} unreadable or empty");
    } else {
        println!(
            "   ✅ Process stat readable for pid {}: {}",
            probe,
            reader.process_command(probe)
        );
    }

    println!(
        "   ℹ️  Clock ticks per second: {}",
        reader.ticks_per_second()
    );

    ok
}

fn check_users(reader: &ProcFs) -> bool {
    println!("\n👤 Checking user database...");
    let path = reader.passwd_path();
    if !path.exists() {
        println!("   ❌ {} not found", path.display());
        return false;
    }

    let root = reader.user_name(0);
    if root.is_empty() {
        println!("   ⚠️  No entry for uid 0 in {}", path.display());
    } else {
        println!("   ✅ uid 0 resolves to {root:?}");
    }
    true
}
