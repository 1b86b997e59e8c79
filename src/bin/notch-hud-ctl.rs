use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process;

fn socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("notch-hud.sock")
}

/// First words the daemon understands; it validates the arguments.
const COMMANDS: &[&str] = &[
    "open",
    "close",
    "toggle",
    "view",
    "hide",
    "volume",
    "brightness",
    "mic",
    "battery",
    "download",
    "notification",
    "music",
    "media",
    "media-cancel",
    "quit",
];

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(first) = args.first() else {
        usage();
        process::exit(1);
    };
    if !COMMANDS.contains(&first.as_str()) {
        eprintln!("unknown command: {first}");
        usage();
        process::exit(1);
    }

    let cmd = args.join(" ");
    let path = socket_path();
    let mut stream = match UnixStream::connect(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("notch-hud not running ({path:?}): {e}");
            process::exit(1);
        }
    };

    if let Err(e) = writeln!(stream, "{cmd}") {
        eprintln!("failed to send command: {e}");
        process::exit(1);
    }
}

fn usage() {
    eprintln!("usage: notch-hud-ctl <command> [args]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  open|close|toggle [display]   drive the notch (default: selected display)");
    eprintln!("  view home|shelf               switch pane, opening the notch if closed");
    eprintln!("  hide sneak-peek|expanding     dismiss an overlay early");
    eprintln!("  volume|brightness <level> [ms]  show a level (0.0-1.0, or whole 2-100 as percent)");
    eprintln!("  battery|download <level> [ms]   show progress in the widened notch");
    eprintln!("  mic on|off                    mic muted indicator");
    eprintln!("  notification <text>           show a text sneak peek");
    eprintln!("  music <title>                 show a track sneak peek");
    eprintln!("  media <command> [param]       play-pause, next, previous, seek, shuffle, repeat, volume");
    eprintln!("  media-cancel                  drop pending media commands");
    eprintln!("  quit                          shut the daemon down");
}
