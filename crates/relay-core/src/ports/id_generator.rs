//! IdGenerator port - ID 生成の抽象化
//!
//! テスト容易性のために、trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{AttemptId, RunId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は run / attempt の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数ワーカーから共有される）
pub trait IdGenerator: Send + Sync {
    fn generate_run_id(&self) -> RunId;

    fn generate_attempt_id(&self) -> AttemptId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時に FixedClock を使えば timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_run_id(&self) -> RunId {
        RunId::from(self.next_ulid())
    }

    fn generate_attempt_id(&self) -> AttemptId {
        AttemptId::from(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_run_id();
        let id2 = id_gen.generate_run_id();

        assert_ne!(id1, id2);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_run_id();
        let id2 = id_gen.generate_attempt_id();

        // ランダム部分があるので ID は異なるが、timestamp 部分は同じ
        assert_ne!(id1.as_ulid(), id2.as_ulid());
        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
