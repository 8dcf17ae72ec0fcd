use chrono::{DateTime, Utc};

/// 时钟抽象，便于在测试中控制时间窗口
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动时钟（用于测试）
pub mod manual {
    use super::*;
    use std::sync::Mutex;

    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        /// 向前拨动时钟
        pub fn advance(&self, duration: chrono::Duration) {
            let mut now = self.now.lock().expect("clock lock poisoned");
            *now += duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().expect("clock lock poisoned")
        }
    }
}
