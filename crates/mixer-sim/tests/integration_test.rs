use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Output};
use std::thread;
use std::time::Duration;

const BIN: &str = env!("CARGO_BIN_EXE_mixer-sim");

struct SimProcess {
    child: Child,
    addr: String,
}

impl SimProcess {
    fn start(extra: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .expect("Failed to bind ephemeral port for integration test");
        let addr = listener
            .local_addr()
            .expect("Failed to resolve bound address");
        let bind_addr = format!("127.0.0.1:{}", addr.port());
        drop(listener);

        let child = Command::new(BIN)
            .args(["--bind", &bind_addr])
            .args(extra)
            .spawn()
            .expect("Failed to start mixer-sim");

        // Loop until port is open (up to 5s)
        let start = std::time::Instant::now();
        while start.elapsed().as_secs() < 5 {
            if TcpStream::connect(&bind_addr).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }

        Self {
            child,
            addr: bind_addr,
        }
    }

    fn connect(&self) -> (TcpStream, BufReader<TcpStream>) {
        let stream = TcpStream::connect(&self.addr).expect("Failed to connect to mixer-sim");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        (stream, reader)
    }
}

impl Drop for SimProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn read_state(reader: &mut BufReader<TcpStream>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("state line");
    serde_json::from_str(&line).expect("state line is JSON")
}

fn run_to_completion(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .output()
        .expect("Failed to run mixer-sim")
}

#[test]
fn bridge_streams_mirrored_equipment() {
    let sim = SimProcess::start(&["--tick-ms", "20", "--seed", "7", "--run-seconds", "20"]);
    let (mut stream, mut reader) = sim.connect();
    writeln!(
        stream,
        r#"{{"type":"hello","protocol_version":{{"major":1,"minor":0}},"client_id":"it"}}"#
    )
    .unwrap();

    let mut last_tick = 0;
    let mut last_sequence = 0;
    for _ in 0..10 {
        let state = read_state(&mut reader);
        assert_eq!(state["type"], "state");
        assert_eq!(state["protocol_version"]["major"], 1);

        let tick = state["tick"].as_u64().unwrap();
        let sequence = state["sequence"].as_u64().unwrap();
        assert!(tick >= last_tick, "tick went backwards");
        assert!(sequence > last_sequence);
        last_tick = tick;
        last_sequence = sequence;

        let equipment = state["equipment"].as_object().unwrap();
        assert_eq!(equipment.len(), 4);
        for name in ["Mixer100", "Mixer200", "Mixer300", "Mixer400"] {
            let tags = equipment[name].as_object().unwrap();
            assert_eq!(tags.len(), 24);
            assert_eq!(equipment[name], equipment["Mixer100"]);
        }

        let tags = &equipment["Mixer100"];
        let level = tags["Level.PV"].as_f64().unwrap();
        let temperature = tags["Temperature.PV"].as_f64().unwrap();
        assert!((0.0..=1000.0).contains(&level));
        assert!((71.816..=300.0).contains(&temperature));
        if tick == 0 {
            assert_eq!(level, 0.0);
        }
    }
    assert!(last_tick > 0, "simulation never advanced");
}

#[test]
fn short_run_writes_audit_trail() {
    let dir = tempfile::tempdir().unwrap();
    let audit = dir.path().join("audit.jsonl");
    let output = run_to_completion(&[
        "--no-bridge",
        "--tick-ms",
        "5",
        "--run-ticks",
        "80",
        "--audit-log",
        audit.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let content = std::fs::read_to_string(&audit).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["system_start", "phase_transition", "system_shutdown"]);

    let transition = &events[1]["details"];
    assert_eq!(transition["tick"], 72);
    assert_eq!(transition["from"], "filling");
    assert_eq!(transition["to"], "mixing");
    assert_eq!(events[2]["details"]["ticks_executed"], 80);
}

#[cfg(unix)]
#[test]
fn interrupt_shuts_down_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let audit = dir.path().join("audit.jsonl");
    let mut child = Command::new(BIN)
        .args(["--no-bridge", "--tick-ms", "10", "--audit-log"])
        .arg(&audit)
        .spawn()
        .expect("Failed to start mixer-sim");

    // The interrupt handler is installed before system_start is written.
    let start = std::time::Instant::now();
    while start.elapsed().as_secs() < 5 {
        let content = std::fs::read_to_string(&audit).unwrap_or_default();
        if content.contains("system_start") {
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }
    thread::sleep(Duration::from_millis(300));

    let kill = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(kill.success());
    let status = child.wait().unwrap();
    assert!(status.success(), "exit status: {status:?}");

    let content = std::fs::read_to_string(&audit).unwrap();
    let kinds: Vec<String> = content
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            event["event_type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds.first().map(String::as_str), Some("system_start"));
    assert_eq!(kinds.last().map(String::as_str), Some("system_shutdown"));
}

#[test]
fn help_exits_cleanly() {
    let output = run_to_completion(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--tick-ms"));
    assert!(stdout.contains("--equipment"));
}

#[test]
fn invalid_arguments_fail_fast() {
    let output = run_to_completion(&["--tick-ms", "soon"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--tick-ms"));

    let output = run_to_completion(&["--no-bridge", "--run-ticks", "1", "--mixing-time", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("MixingTime.PV"));
}
