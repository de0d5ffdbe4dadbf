use meridian::board::Color;
use meridian::engine::{time, Engine, EngineEvent, EngineOptions, GoParams};
use meridian::logger::init_file_logging;
use meridian::search::search::{ScoreReport, SearchInfo};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;

const ENGINE_NAME: &str = "Meridian 0.9";
const ENGINE_AUTHOR: &str = "the Meridian authors";

fn main() {
    init_file_logging("logs/meridian.log", "meridian=info");

    let mut engine: Option<Engine> = None;
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line.trim().to_string(),
            Err(_) => break,
        };
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts[0] {
            "uci" => handle_uci(),
            "isready" => {
                ensure_engine(&mut engine);
                println!("readyok");
            }
            "ucinewgame" => ensure_engine(&mut engine).new_game(),
            "position" => handle_position(ensure_engine(&mut engine), &parts),
            "go" => handle_go(ensure_engine(&mut engine), &parts),
            "ponderhit" => ensure_engine(&mut engine).ponder_hit(),
            "stop" => ensure_engine(&mut engine).stop(),
            "setoption" => handle_setoption(ensure_engine(&mut engine), &parts),
            "d" => println!("{}", ensure_engine(&mut engine).diagnostics()),
            "quit" => {
                if let Some(mut engine) = engine.take() {
                    engine.quit();
                }
                break;
            }
            other => tracing::warn!(command = other, "ignoring unknown command"),
        }
    }
}

fn ensure_engine(slot: &mut Option<Engine>) -> &mut Engine {
    slot.get_or_insert_with(|| {
        Engine::new(EngineOptions::default(), Arc::new(print_event))
    })
}

fn handle_uci() {
    println!("id name {ENGINE_NAME}");
    println!("id author {ENGINE_AUTHOR}");
    println!("option name Hash type spin default 64 min 1 max 1024");
    println!("option name Ponder type check default false");
    println!("option name OwnBook type check default true");
    println!("uciok");
}

fn print_event(event: EngineEvent) {
    match event {
        EngineEvent::BestMove { best, ponder } => match ponder {
            Some(ponder) => println!("bestmove {best} ponder {ponder}"),
            None => println!("bestmove {best}"),
        },
        EngineEvent::Info(info) => print_info(&info),
        EngineEvent::Diagnostic(text) => println!("info string {text}"),
    }
}

fn print_info(info: &SearchInfo) {
    let score = match info.score {
        ScoreReport::Cp(cp) => format!("cp {cp}"),
        ScoreReport::Mate(moves) => format!("mate {moves}"),
    };
    let mut line = format!(
        "info depth {} seldepth {} time {} nodes {} nps {} score {} hashfull {}",
        info.depth, info.seldepth, info.time_ms, info.nodes, info.nps, score, info.hashfull
    );
    if !info.pv.is_empty() {
        line.push_str(" pv");
        for mv in &info.pv {
            line.push(' ');
            line.push_str(&mv.to_uci());
        }
    }
    println!("{line}");
}

fn handle_position(engine: &mut Engine, parts: &[&str]) {
    let moves_index = parts.iter().position(|&p| p == "moves");
    let moves: Vec<String> = match moves_index {
        Some(index) => parts[index + 1..].iter().map(|s| s.to_string()).collect(),
        None => Vec::new(),
    };

    let fen = match parts.get(1) {
        Some(&"startpos") => None,
        Some(&"fen") => {
            let end = moves_index.unwrap_or(parts.len());
            Some(parts[2..end].join(" "))
        }
        _ => {
            tracing::warn!(line = ?parts, "malformed position command");
            return;
        }
    };

    if let Err(error) = engine.set_position(fen.as_deref(), &moves) {
        tracing::warn!(%error, "position rejected");
    }
}

fn handle_go(engine: &mut Engine, parts: &[&str]) {
    let mut params = GoParams::default();
    let mut movetime: Option<u64> = None;
    let mut wtime: Option<u64> = None;
    let mut btime: Option<u64> = None;
    let mut winc: u64 = 0;
    let mut binc: u64 = 0;

    fn value_after(parts: &[&str], i: usize) -> Option<u64> {
        parts.get(i + 1).and_then(|v| v.parse().ok())
    }

    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "ponder" => {
                params.ponder = true;
                i += 1;
            }
            "infinite" => {
                i += 1;
            }
            "movetime" => {
                movetime = value_after(parts, i);
                i += 2;
            }
            "wtime" => {
                wtime = value_after(parts, i);
                i += 2;
            }
            "btime" => {
                btime = value_after(parts, i);
                i += 2;
            }
            "winc" => {
                winc = value_after(parts, i).unwrap_or(0);
                i += 2;
            }
            "binc" => {
                binc = value_after(parts, i).unwrap_or(0);
                i += 2;
            }
            "depth" => {
                if let Some(depth) = value_after(parts, i) {
                    params.max_depth = depth as i32;
                }
                i += 2;
            }
            other => {
                tracing::debug!(token = other, "ignoring go token");
                i += 1;
            }
        }
    }

    params.budget = if let Some(ms) = movetime {
        Some(Duration::from_millis(ms))
    } else {
        let (my_time, my_inc) = match engine.side_to_move() {
            Color::White => (wtime, winc),
            Color::Black => (btime, binc),
        };
        my_time.map(|remaining| Duration::from_millis(time::think_time_ms(remaining, my_inc)))
    };

    engine.go(params);
}

fn handle_setoption(engine: &mut Engine, parts: &[&str]) {
    let name_index = parts.iter().position(|&p| p == "name");
    let value_index = parts.iter().position(|&p| p == "value");
    let (Some(name_index), Some(value_index)) = (name_index, value_index) else {
        tracing::warn!(line = ?parts, "malformed setoption");
        return;
    };
    let name = parts[name_index + 1..value_index].join(" ");
    let value = parts[value_index + 1..].join(" ");
    if let Err(error) = engine.set_option(&name, &value) {
        tracing::warn!(%error, "setoption rejected");
    }
}
