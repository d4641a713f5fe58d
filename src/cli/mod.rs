use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;

use crate::device::{DeviceClient, PlaybackInfo};
use crate::scanner::MediaScanner;

fn print_field(label: &str, value: &Option<String>) {
    if let Some(value) = value {
        println!("  {:<8} {}", label, value);
    }
}

fn print_playback(info: &PlaybackInfo) {
    println!();
    print_field("Title:", &info.title);
    print_field("Path:", &info.full_path);
    print_field("Status:", &info.current_status);
    match (&info.current_time, &info.total_time) {
        (Some(current), Some(total)) => println!("  {:<8} {} / {}", "Time:", current, total),
        (current, None) => print_field("Time:", current),
        (None, total) => print_field("Length:", total),
    }
    println!();
}

fn print_list(title: &str, items: &[String]) {
    println!();
    println!("  {} ({}):", title, items.len());
    for item in items {
        println!("    {}", item);
    }
    println!();
}

fn report(action: &str, ok: bool) -> Result<(), String> {
    if ok {
        println!();
        println!("  {} sent", action);
        println!();
        Ok(())
    } else {
        Err(format!("{} failed", action))
    }
}

/// Execute a single command line against the device
async fn execute_query(client: &DeviceClient, query: &str) -> Result<(), String> {
    let query = query.trim();
    let (command, rest) = match query.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (query, ""),
    };

    match (command, rest) {
        ("status" | "now-playing", "") => match client.now_playing().await {
            Some(info) => {
                print_playback(&info);
                Ok(())
            }
            None => {
                println!();
                println!("  Nothing playing (or device unreachable).");
                println!();
                Ok(())
            }
        },
        ("play", path) if !path.is_empty() => report("Play", client.play(path, None).await),
        ("enqueue", path) if !path.is_empty() => {
            report("Enqueue", client.enqueue(path, None).await)
        }
        ("pause", "") => report("Pause", client.pause().await),
        ("resume", "") => report("Resume", client.resume().await),
        ("stop", "") => report("Stop", client.stop().await),
        ("next", "") => report("Next", client.next().await),
        ("prev" | "previous", "") => report("Previous", client.previous().await),
        ("key", key) if !key.is_empty() => {
            report(&format!("Key '{}'", key), client.send_key(key).await)
        }
        ("keys", "") => match client.keys().await {
            Some(keys) => {
                print_list("Available keys", &keys);
                Ok(())
            }
            None => Err("Could not list keys".to_string()),
        },
        ("formats", "") => match client.supported_video_formats().await {
            Some(formats) => {
                print_list("Supported video formats", &formats);
                Ok(())
            }
            None => Err("Could not list video formats".to_string()),
        },
        ("help", "") => {
            println!();
            println!("  Available commands:");
            println!("    status             - Show what is playing");
            println!("    play <path|url>    - Play a video now");
            println!("    enqueue <path|url> - Add a video to the queue");
            println!("    pause | resume     - Pause or resume playback");
            println!("    stop               - Stop playback");
            println!("    next | prev        - Skip within the queue");
            println!("    keys               - List remote-control keys");
            println!("    key <name>         - Send a remote-control key");
            println!("    formats            - List supported video formats");
            println!("    help               - Show this help message");
            println!("    quit               - Exit interactive mode");
            println!();
            Ok(())
        }
        ("", "") => Ok(()),
        ("play" | "enqueue", "") => Err(format!("Usage: {} <path|url>", command)),
        ("key", "") => Err("Usage: key <name>\nUse 'keys' to see available key names.".to_string()),
        _ => Err(format!("Unknown command: {}\nType 'help' for available commands.", query)),
    }
}

/// Handle a one-shot query command
pub async fn handle_query(
    client: &DeviceClient,
    query: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    execute_query(client, query).await.map_err(|e| e.into())
}

/// Handle interactive mode - read commands from stdin with history support
pub async fn handle_interactive(client: &DeviceClient) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("PCH Remote - Interactive Mode");
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!("Use arrow keys or Ctrl-P/Ctrl-N to navigate command history.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let command = line.trim();

                // Skip empty lines but don't add to history
                if command.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(command);

                if command == "quit" || command == "exit" {
                    break;
                }

                if let Err(e) = execute_query(client, command).await {
                    println!("  Error: {}", e);
                    println!();
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C - just print newline and continue
                println!();
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                println!("  Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Stop whatever is playing, then play every matching file under `dir` in
/// random order. Returns how many files were handed to the device.
pub async fn play_shuffled(client: &DeviceClient, scanner: &MediaScanner, dir: &Path) -> usize {
    let files = scanner.scan_shuffled(dir);
    let (first, rest) = match files.split_first() {
        Some(split) => split,
        None => return 0,
    };

    if !client.stop().await {
        log::debug!("Stop before shuffle was not acknowledged");
    }

    let first = first.to_string_lossy();
    if !client.play(&first, None).await {
        log::warn!("Device refused to play {}", first);
    }
    for file in rest {
        let file = file.to_string_lossy();
        if !client.enqueue(&file, None).await {
            log::warn!("Device refused to enqueue {}", file);
        }
    }

    files.len()
}

/// Handle the shuffle command
pub async fn handle_shuffle(
    client: &DeviceClient,
    dir: &Path,
    extensions: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let scanner = if extensions.is_empty() {
        MediaScanner::videos()
    } else {
        MediaScanner::new(Some(extensions))
    };

    match play_shuffled(client, &scanner, dir).await {
        0 => println!("No video files found"),
        count => println!("Queued {} video(s) in random order", count),
    }
    Ok(())
}
