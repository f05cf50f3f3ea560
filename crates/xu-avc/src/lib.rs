//! # xu-avc
//!
//! H.264/AVC 参考图像管理库, 实现 ISO 14496/10(2020) 8.2 条带解码
//! 流程中的参考簿记部分:
//!
//! - 8.2.1 图像序计数 (POC) 推导, 覆盖三种 `pic_order_cnt_type`
//! - 8.2.4 参考图像列表构建 (初始排序与显式重排序)
//! - 8.2.5 已解码参考图像标记 (滑动窗口与自适应 MMCO)
//!
//! 输入为上游反序列化器产出的结构化 [`syntax::NalUnit`] 记录, 输出为
//! 当前图像的场序计数、两条参考图像列表与存活参考图像集合, 供下游
//! 像素重建阶段消费; 本库不做比特流解析, 也不做像素解码.
//!
//! 入口类型为 [`H264SliceDecoder`], 它持有参数集登记表、图像仓库
//! ([`Dpb`]) 与列表状态, 逐个消费 NAL 记录.

pub mod decoder;
pub mod dpb;
pub mod picture;
pub mod syntax;

pub use decoder::{DeferredEffect, H264SliceDecoder};
pub use dpb::Dpb;
pub use picture::{NO_LONG_TERM_FRAME_INDICES, PictureContext, PictureId, ReferenceFlags};
pub use syntax::{
    DecRefPicMarking, MmcoOp, NalPayload, NalUnit, PicOrderCntType, PictureParameterSet,
    RefPicListMod, SequenceParameterSet, SliceHeader, SliceType,
};
