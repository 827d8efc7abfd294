use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};

use log::info;
use tendril_core::{
    CallableReference, HandlerError, HandlerResult, MethodId, RUN_ONCE, RecurringActionScheduler,
    StoreConfig, SubscriberStore, TopicSource,
};

#[derive(Debug, Deserialize)]
struct PriceTick {
    symbol: String,
    price: f64,
}

/// 画面表示。store には weak で登録するので、drop されたら自然に外れる
struct Dashboard {
    name: &'static str,
}

impl Dashboard {
    fn on_tick(&self, source: &TopicSource, tick: &PriceTick) -> HandlerResult {
        println!("[{}] {} {} = {:.2}", self.name, source.name(), tick.symbol, tick.price);
        Ok(())
    }
}

/// 監査ログ。store に strong で持たせる
struct AuditLog {
    seen: AtomicU32,
}

impl AuditLog {
    fn record(&self, _source: &TopicSource, tick: &PriceTick) -> HandlerResult {
        if !tick.price.is_finite() {
            return Err(HandlerError::new(format!("bad price for {}", tick.symbol)));
        }
        self.seen.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn alert_on_spike(_source: &TopicSource, tick: &PriceTick) -> HandlerResult {
    if tick.price > 1000.0 {
        println!("ALERT: {} spiked to {:.2}", tick.symbol, tick.price);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // (A) store を用意（50ms ごとに purge、最後の payload をキャッシュ）
    let store = SubscriberStore::with_config(
        TopicSource::new("prices"),
        StoreConfig::default()
            .with_purge_interval(50)
            .with_cached_payload(),
    );

    // (B) 購読者を登録：weak / strong / static
    let dashboard = Arc::new(Dashboard { name: "dashboard" });
    let audit = Arc::new(AuditLog {
        seen: AtomicU32::new(0),
    });
    store.subscribe(CallableReference::weak(
        MethodId::of::<Dashboard>("on_tick"),
        &dashboard,
        Dashboard::on_tick,
    ))?;
    store.subscribe(CallableReference::strong(
        MethodId::of::<AuditLog>("record"),
        &audit,
        AuditLog::record,
    ))?;
    store.subscribe(CallableReference::static_fn(
        MethodId::from_static("alerts", "alert_on_spike"),
        alert_on_spike,
    ))?;

    // (C) 通知（payload は JSON から）
    let ticks: Vec<PriceTick> = serde_json::from_str(
        r#"[{ "symbol": "ACME", "price": 101.5 }, { "symbol": "ACME", "price": 1204.0 }]"#,
    )?;
    for tick in ticks {
        store.notify(tick)?;
    }

    // (D) dashboard を捨てて purge を待つ
    drop(dashboard);
    sleep(Duration::from_millis(150)).await;
    store.renotify()?;
    println!("audit saw {} tick(s)", audit.seen.load(Ordering::Relaxed));
    println!("stats: {}", serde_json::to_string_pretty(&store.stats())?);

    // (E) 単発実行の scheduler
    let scheduler = RecurringActionScheduler::new(|| info!("one-shot action ran"));
    scheduler.set_interval(RUN_ONCE);
    while scheduler.run_count() == 0 {
        sleep(Duration::from_millis(5)).await;
    }
    println!("scheduler {} ran {} time(s)", scheduler.id(), scheduler.run_count());

    // dispose は in-flight のサイクルをブロッキングで待つので blocking pool で
    tokio::task::spawn_blocking(move || {
        scheduler.dispose();
        store.dispose();
    })
    .await?;
    Ok(())
}
