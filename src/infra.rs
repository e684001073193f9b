//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for the runner: the
//! command-line host executor, the worker process protocol, file system
//! helpers and logging setup.
//!
//! 此模块为运行器提供基础设施服务：命令行主机执行器、工作进程协议、文件系统辅助函数和日志设置。

pub mod command;
pub mod fs;
pub mod logging;
pub mod worker;
