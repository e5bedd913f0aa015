use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use rand::Rng;
use std::{
    path::Path,
    sync::OnceLock,
    time::Duration,
};
use tokio::io::{
    AsyncBufReadExt,
    BufReader,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};
use wager_session::{
    SessionController,
    SessionHandle,
    UserAction,
    config::{
        ClientConfig,
        ConfigStore,
        ControllerSettings,
        FileConfigStore,
        resolve_config_dir,
    },
    memory::{
        InMemoryLedger,
        InMemoryWallet,
    },
    surface::{
        SessionView,
        Severity,
        Surface,
    },
    types::{
        Account,
        Address,
        Amount,
        GameKind,
    },
};

const DEMO_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
const DEMO_ACCOUNTS: [&str; 2] = [
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
    "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
];

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

struct CliArgs {
    config_dir: Option<String>,
    contract: Option<String>,
    confirm_timeout: Option<Duration>,
    log_stderr: bool,
}

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: wager-session [--config-dir <path>] [--contract <address>]\n\
         [--confirm-timeout <secs>] [--log-stderr]\n\
         \n\
         Flags:\n\
           --config-dir <path>      Settings directory (defaults to ~/.wager-session)\n\
           --contract <address>     Save <address> as the contract before starting\n\
           --confirm-timeout <secs> Give up waiting for a wager confirmation after <secs>\n\
           --log-stderr             Log to stderr instead of the rolling log file\n\
         \n\
         Commands (stdin):\n\
           connect | disconnect | contract <address> | refresh\n\
           coin <0|1> | dice <1-6> | stake <coin|dice> <amount> | bet <coin|dice>\n\
           account [<address>...] | network | settle | quit"
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<CliArgs> {
    let mut args = std::env::args().skip(1);
    let mut cli = CliArgs {
        config_dir: None,
        contract: None,
        confirm_timeout: None,
        log_stderr: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--config-dir requires a path argument"))?;
                if cli.config_dir.is_some() {
                    return Err(eyre!("--config-dir may only be specified once"));
                }
                cli.config_dir = Some(dir);
            }
            "--contract" => {
                let address = args
                    .next()
                    .ok_or_else(|| eyre!("--contract requires an address argument"))?;
                if cli.contract.is_some() {
                    return Err(eyre!("--contract may only be specified once"));
                }
                cli.contract = Some(address);
            }
            "--confirm-timeout" => {
                let secs = args
                    .next()
                    .ok_or_else(|| eyre!("--confirm-timeout requires a number of seconds"))?;
                let secs: u64 = secs
                    .parse()
                    .wrap_err_with(|| format!("invalid --confirm-timeout value {secs}"))?;
                cli.confirm_timeout = Some(Duration::from_secs(secs));
            }
            "--log-stderr" => cli.log_stderr = true,
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }
    Ok(cli)
}

fn init_tracing(log_stderr: bool, log_dir: &Path) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_stderr {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    }
    let appender = rolling::daily(log_dir.join("logs"), "wager-session.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
}

/// Prints notifications as they come and the view whenever it changes.
#[derive(Default)]
struct TextSurface {
    last: Option<SessionView>,
}

impl Surface for TextSurface {
    fn render(&mut self, view: &SessionView) {
        if self.last.as_ref() == Some(view) {
            return;
        }
        println!("{view}");
        self.last = Some(view.clone());
    }

    fn notify(&mut self, message: &str, severity: Severity) {
        println!("[{severity}] {message}");
    }
}

/// The demo ledger lives wherever the saved config points, so bindings made
/// from it resolve.
fn deployed_contract(saved: &ClientConfig) -> Result<Address> {
    match saved.contract() {
        Some(address) => Ok(address),
        None => DEMO_CONTRACT.parse().map_err(|e| eyre!("{e}")),
    }
}

fn parse_game(raw: Option<&str>) -> Result<GameKind> {
    match raw {
        Some("coin") => Ok(GameKind::Coin),
        Some("dice") => Ok(GameKind::Dice),
        _ => Err(eyre!("expected `coin` or `dice`")),
    }
}

/// Settles every open bet at random, the way the house would.
fn settle_open_bets(ledger: &InMemoryLedger) -> Result<usize> {
    let mut rng = rand::rng();
    let open = ledger.unresolved_bets();
    for bet in &open {
        let (result, multiplier) = match bet.game {
            GameKind::Coin => (rng.random_range(0..=1), 2),
            GameKind::Dice => (rng.random_range(1..=6), 6),
        };
        let won = result == bet.prediction;
        let payout = if won {
            bet.stake.saturating_mul(multiplier)
        } else {
            Amount::ZERO
        };
        ledger
            .resolve(bet.id, result, won, payout)
            .map_err(|e| eyre!(e))?;
    }
    Ok(open.len())
}

fn run_command(
    line: &str,
    handle: &SessionHandle,
    ledger: &InMemoryLedger,
    wallet: &InMemoryWallet,
) -> Result<bool> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };
    let action = match command {
        "connect" => UserAction::Connect,
        "disconnect" => UserAction::Disconnect,
        "refresh" => UserAction::RefreshStats,
        "contract" => UserAction::UpdateContractAddress(words.collect::<Vec<_>>().join(" ")),
        "coin" | "dice" => {
            let prediction = words
                .next()
                .ok_or_else(|| eyre!("{command} requires a prediction"))?
                .parse()
                .wrap_err("prediction must be a number")?;
            UserAction::SelectPrediction {
                game: parse_game(Some(command))?,
                prediction,
            }
        }
        "stake" => UserAction::SetStake {
            game: parse_game(words.next())?,
            input: words.next().unwrap_or_default().to_string(),
        },
        "bet" => UserAction::PlaceWager(parse_game(words.next())?),
        "account" => {
            let accounts = words
                .map(|raw| raw.parse::<Account>().map_err(|e| eyre!(e)))
                .collect::<Result<Vec<_>>>()?;
            wallet.set_accounts(accounts.clone());
            handle.accounts_changed(accounts);
            return Ok(true);
        }
        "network" => {
            let next = ledger.network() + 1;
            wallet.switch_network(next);
            ledger.redeploy_here();
            handle.network_changed();
            return Ok(true);
        }
        "settle" => {
            let settled = settle_open_bets(ledger)?;
            println!("house settled {settled} bet(s)");
            return Ok(true);
        }
        "quit" | "exit" => {
            handle.shutdown();
            return Ok(false);
        }
        other => return Err(eyre!("unknown command `{other}`")),
    };
    Ok(handle.user(action))
}

async fn read_commands(handle: SessionHandle, ledger: InMemoryLedger, wallet: InMemoryWallet) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::error!(%err, "failed to read stdin");
                break;
            }
        };
        match run_command(line.trim(), &handle, &ledger, &wallet) {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => println!("[error] {err}"),
        }
    }
    handle.shutdown();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = parse_cli_args()?;
    let config_dir =
        resolve_config_dir(cli.config_dir.as_deref()).map_err(|e| eyre!(e))?;
    let mut store = FileConfigStore::new(&config_dir).map_err(|e| eyre!(e))?;
    init_tracing(cli.log_stderr, &config_dir);
    tracing::info!(config = %store.path().display(), "starting wager-session");

    if let Some(raw) = &cli.contract {
        let address: Address = raw.parse().map_err(|e| eyre!("--contract: {e}"))?;
        store
            .save(&ClientConfig {
                contract_address: Some(address.to_string()),
            })
            .map_err(|e| eyre!(e))?;
    }
    let saved = store.load().map_err(|e| eyre!(e))?;
    let ledger = InMemoryLedger::new(deployed_contract(&saved)?);
    ledger.fund_contract(Amount::from_whole(1_000));
    let accounts = DEMO_ACCOUNTS
        .iter()
        .map(|raw| raw.parse::<Account>().map_err(|e| eyre!(e)))
        .collect::<Result<Vec<_>>>()?;
    for account in &accounts {
        ledger.fund(*account, Amount::from_whole(100));
    }
    let wallet = InMemoryWallet::new(ledger.clone(), accounts);

    let settings = ControllerSettings {
        confirmation_timeout: cli.confirm_timeout,
        ..ControllerSettings::default()
    };
    let controller = SessionController::new(
        wallet.clone(),
        ledger.clone(),
        TextSurface::default(),
        store,
        settings,
    );
    let handle = controller.handle();
    tokio::spawn(read_commands(handle, ledger, wallet));
    controller.run().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn deployed_contract__follows_saved_address() {
        // given
        let saved = ClientConfig {
            contract_address: Some("0x00000000000000000000000000000000000000c0".into()),
        };

        // when
        let deployed = deployed_contract(&saved).unwrap();

        // then
        assert_eq!(deployed, Address::new({
            let mut bytes = [0; 20];
            bytes[19] = 0xc0;
            bytes
        }));
    }

    #[test]
    fn deployed_contract__falls_back_to_demo_address() {
        let deployed = deployed_contract(&ClientConfig::default()).unwrap();
        assert_eq!(deployed, DEMO_CONTRACT.parse::<Address>().unwrap());
    }
}
