use std::sync::atomic::{AtomicBool, Ordering};

/// 全服务唯一的忙碌标记，保证重型计算（摄取、降维）串行执行
///
/// 不排队：占用期间的第二个重型请求直接失败，由调用方稍后重试。
/// 释放由 [`BusyGuard`] 的 Drop 保证，任何退出路径（包括错误和 panic）都不会
/// 使服务卡在忙碌状态。
#[derive(Debug, Default)]
pub struct BusyGate {
    busy: AtomicBool,
}

impl BusyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前是否有重型计算在执行
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 尝试占用，成功返回守卫，失败返回 `None`
    pub fn try_enter(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { gate: self })
    }
}

/// 忙碌标记的持有凭证，离开作用域时自动释放
#[must_use = "守卫被丢弃时立即释放忙碌标记"]
pub struct BusyGuard<'a> {
    gate: &'a BusyGate,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_flight() {
        let gate = BusyGate::new();
        assert!(!gate.is_busy());

        let guard = gate.try_enter().unwrap();
        assert!(gate.is_busy());
        // 占用期间的第二次尝试必须失败
        assert!(gate.try_enter().is_none());

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_enter().is_some());
    }

    #[test]
    fn released_on_early_return() {
        let gate = BusyGate::new();
        let result: Result<(), ()> = (|| {
            let _guard = gate.try_enter().ok_or(())?;
            Err(())
        })();
        assert!(result.is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn released_on_panic() {
        let gate = BusyGate::new();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = gate.try_enter().unwrap();
            panic!("boom");
        }));
        assert!(caught.is_err());
        assert!(!gate.is_busy());
    }
}
