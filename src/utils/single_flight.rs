use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::watch;

/// 同一个 key 的并发请求合并为一次执行
///
/// 注册表的锁只在增删条目时持有，执行本身不在锁内。
pub struct SingleFlight<T> {
    calls: Mutex<HashMap<String, Arc<Call<T>>>>,
}

struct Call<T> {
    tx: watch::Sender<Option<T>>,
    /// 搭便车的调用方数量
    dups: AtomicUsize,
    forgotten: Arc<AtomicBool>,
}

/// 交给执行方的凭证，用来判断这次执行是否已被 forget
#[derive(Clone)]
pub struct FlightTicket {
    forgotten: Arc<AtomicBool>,
}

impl FlightTicket {
    /// 执行期间没有被 forget，结果仍然可以写回缓存
    pub fn is_current(&self) -> bool {
        !self.forgotten.load(Ordering::Acquire)
    }
}

/// 执行方退出时（正常结束或被取消）把自己从注册表中移除
struct Leave<'a, T> {
    flight: &'a SingleFlight<T>,
    key: &'a str,
    call: Arc<Call<T>>,
}

impl<T> Drop for Leave<'_, T> {
    fn drop(&mut self) {
        let mut calls = self.flight.calls.lock();
        if calls
            .get(self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.call))
        {
            calls.remove(self.key);
        }
    }
}

enum Role<T> {
    Leader(Arc<Call<T>>),
    Follower(watch::Receiver<Option<T>>),
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 执行 f，同一 key 已有执行中的请求时等待其结果
    ///
    /// 返回值的第二项表示结果是否被多个调用方共享。执行方被取消时，
    /// 等待者会重新竞争，由其中一个接手执行。
    pub async fn work<F, Fut>(&self, key: &str, f: F) -> (T, bool)
    where
        F: FnOnce(FlightTicket) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut f = Some(f);
        loop {
            match self.join(key) {
                Role::Leader(call) => {
                    let Some(f) = f.take() else {
                        unreachable!("leader runs at most once");
                    };
                    let ticket = FlightTicket {
                        forgotten: Arc::clone(&call.forgotten),
                    };
                    let _leave = Leave {
                        flight: self,
                        key,
                        call: Arc::clone(&call),
                    };
                    let value = f(ticket).await;
                    call.tx.send_replace(Some(value.clone()));
                    let shared = call.dups.load(Ordering::Acquire) > 0;
                    return (value, shared);
                }
                Role::Follower(mut rx) => {
                    let value = match rx.wait_for(Option::is_some).await {
                        Ok(value) => value.clone(),
                        Err(_) => None,
                    };
                    if let Some(value) = value {
                        return (value, true);
                    }
                    // 执行方中途退出，没有留下结果
                    tracing::debug!("single flight leader for {} went away, retrying", key);
                }
            }
        }
    }

    /// 让后续请求不再复用当前执行中的结果，并通知执行方不要回写
    pub fn forget(&self, key: &str) {
        if let Some(call) = self.calls.lock().remove(key) {
            call.forgotten.store(true, Ordering::Release);
        }
    }

    /// 当前执行中的 key 数量
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn join(&self, key: &str) -> Role<T> {
        let mut calls = self.calls.lock();
        if let Some(call) = calls.get(key) {
            call.dups.fetch_add(1, Ordering::AcqRel);
            return Role::Follower(call.tx.subscribe());
        }

        let (tx, _) = watch::channel(None);
        let call = Arc::new(Call {
            tx,
            dups: AtomicUsize::new(0),
            forgotten: Arc::new(AtomicBool::new(false)),
        });
        calls.insert(key.to_string(), Arc::clone(&call));
        Role::Leader(call)
    }
}
