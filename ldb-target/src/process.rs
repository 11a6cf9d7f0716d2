//! プロセス制御機能

use crate::Result;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

/// 検査対象のプロセス
///
/// アタッチ中はターゲットが停止しているので、その間だけメモリとレジスタを読む。
/// ドロップ時にデタッチする。
pub struct Process {
    pid: Pid,
}

impl Process {
    /// 既存のプロセスにアタッチし、停止するまで待つ
    pub fn attach(pid: i32) -> Result<Self> {
        let pid = Pid::from_raw(pid);
        nix::sys::ptrace::attach(pid)?;

        match waitpid(pid, None)? {
            WaitStatus::Stopped(_, signal) => {
                tracing::debug!("Process {} stopped with {:?}", pid, signal);
                Ok(Self { pid })
            }
            status => {
                let _ = nix::sys::ptrace::detach(pid, None);
                Err(anyhow::anyhow!("Unexpected wait status after attach: {:?}", status))
            }
        }
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        let _ = nix::sys::ptrace::detach(self.pid, None);
    }
}
