//! # Xu (序)
//!
//! 纯 Rust 实现的 H.264/AVC 参考图像管理引擎.
//!
//! Xu 实现 ISO 14496/10(2020) 8.2 条带解码流程中的参考簿记部分:
//! - **图像序计数 (POC)**: 三种 `pic_order_cnt_type` 的显示顺序推导
//! - **参考图像标记**: 滑动窗口与自适应 (MMCO) 两种标记策略
//! - **参考图像列表**: P/B 条带初始列表构建与显式重排序
//! - **参数集登记**: SPS/PPS 按 id 登记与查询
//!
//! 上游反序列化器产出结构化 NAL 记录, 本库消费记录并维护图像序
//! 计数、两条参考图像列表与存活参考图像集合; 像素重建由下游负责.
//!
//! # 快速开始
//!
//! ```rust
//! use xu::avc::{H264SliceDecoder, NalUnit, PictureParameterSet, SequenceParameterSet};
//! use xu::avc::{SliceHeader, SliceType};
//!
//! let mut decoder = H264SliceDecoder::new();
//!
//! // 登记参数集
//! let sps = SequenceParameterSet {
//!     max_num_ref_frames: 4,
//!     ..Default::default()
//! };
//! decoder.process_nal(&NalUnit::sps(sps))?;
//! decoder.process_nal(&NalUnit::pps(PictureParameterSet::default()))?;
//!
//! // 解码一幅 IDR 图像
//! let idr = SliceHeader {
//!     slice_type: SliceType::I,
//!     ..Default::default()
//! };
//! decoder.process_nal(&NalUnit::idr(idr))?;
//! assert!(decoder.current_picture().is_some());
//! # Ok::<(), xu::core::XuError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `xu-core` | 错误类型与基础设施 |
//! | `xu-avc` | H.264/AVC 参考图像管理引擎 |

/// 错误类型与基础设施
pub use xu_core as core;

/// H.264/AVC 参考图像管理引擎
pub use xu_avc as avc;

/// 获取 Xu 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
