//! H.264/AVC 参考图像簿记引擎.
//!
//! 按解码顺序消费结构化 NAL 记录, 维护 ISO 14496/10 第 8.2 节定义的
//! 派生状态: 图像序计数 (8.2.1), 参考图像列表 (8.2.4) 与解码参考
//! 图像标记 (8.2.5). 像素重建不在本层.

mod marking;
mod poc;
mod ref_list;

use std::collections::HashMap;

use log::{debug, warn};
use xu_core::{XuError, XuResult};

use crate::dpb::Dpb;
use crate::picture::*;
use crate::syntax::*;

/// 推迟到图像处理末尾执行的效果.
///
/// 下一图像的序计数推导必须看到这些效果生效之后的状态,
/// 因此统一在图像末尾边界应用.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredEffect {
    /// MMCO 5 之后以当前图像自身的序计数为零点重新起算
    RebasePocAfterMmco5 { pic: PictureId },
}

/// 参考图像簿记解码器.
///
/// 单线程同步推进: 一条 NAL 完整处理结束后才接受下一条.
/// 全部可变状态都收拢在本结构内, 除 I 条带路径外没有隐式复位.
#[derive(Debug, Clone, Default)]
pub struct H264SliceDecoder {
    sps_map: HashMap<u32, SequenceParameterSet>,
    pps_map: HashMap<u32, PictureParameterSet>,
    /// 图像竞技场, 含当前图像与全部存活参考图像
    dpb: Dpb,
    /// 当前图像句柄
    current: Option<PictureId>,
    /// 解码顺序上最近完成的图像 (含非参考图像), 序计数进位的来源.
    /// 与竞技场解耦, 图像被剔除后进位链不受影响.
    prev_picture: Option<PictureContext>,
    /// 最近一个参考图像的 frame_num, 用于间隙检测
    prev_ref_frame_num: u16,
    ref_pic_list0: Vec<PictureId>,
    ref_pic_list1: Vec<PictureId>,
    /// 图像末尾效果队列
    pending_effects: Vec<DeferredEffect>,
}

impl H264SliceDecoder {
    pub fn new() -> Self {
        H264SliceDecoder::default()
    }

    /// 处理一条 NAL 记录.
    ///
    /// SPS/PPS 更新参数集仓库; 条带记录推进簿记管线;
    /// SEI 与其他类型在本层直接忽略.
    pub fn process_nal(&mut self, nal: &NalUnit) -> XuResult<()> {
        match &nal.payload {
            NalPayload::Sps(sps) => {
                self.handle_sps(sps);
                Ok(())
            }
            NalPayload::Pps(pps) => {
                self.handle_pps(pps);
                Ok(())
            }
            NalPayload::Slice(header) | NalPayload::IdrSlice(header) => {
                self.decode_slice(nal.nal_ref_idc, header)
            }
            NalPayload::Sei => Ok(()),
            NalPayload::Other(nal_unit_type) => {
                debug!("H264: 忽略 NAL 类型 {}", nal_unit_type);
                Ok(())
            }
        }
    }

    // ============================================================
    // 参数集仓库
    // ============================================================

    /// 处理 SPS 记录, 同 id 整体替换
    fn handle_sps(&mut self, sps: &SequenceParameterSet) {
        debug!(
            "H264: SPS id={} poc_type={:?} max_num_ref_frames={}",
            sps.seq_parameter_set_id, sps.pic_order_cnt_type, sps.max_num_ref_frames
        );
        self.sps_map.insert(sps.seq_parameter_set_id, sps.clone());
    }

    /// 处理 PPS 记录, 同 id 整体替换
    fn handle_pps(&mut self, pps: &PictureParameterSet) {
        debug!(
            "H264: PPS id={} sps={}",
            pps.pic_parameter_set_id, pps.seq_parameter_set_id
        );
        self.pps_map.insert(pps.pic_parameter_set_id, pps.clone());
    }

    // ============================================================
    // 条带簿记管线
    // ============================================================

    /// 条带管线: 参数集解析 → 间隙检测 → 建立图像 → 序计数 →
    /// 参考标记 → 参考列表 → 图像末尾效果与剔除.
    fn decode_slice(&mut self, nal_ref_idc: u8, header: &SliceHeader) -> XuResult<()> {
        let Some(pps) = self.pps_map.get(&header.pic_parameter_set_id).cloned() else {
            warn!(
                "H264: 条带引用未知 PPS id={}, 丢弃该 NAL",
                header.pic_parameter_set_id
            );
            return Ok(());
        };
        let Some(sps) = self.sps_map.get(&pps.seq_parameter_set_id).cloned() else {
            warn!(
                "H264: PPS id={} 引用未知 SPS id={}, 丢弃该 NAL",
                pps.pic_parameter_set_id, pps.seq_parameter_set_id
            );
            return Ok(());
        };

        if sps.frame_mbs_only_flag && header.field_pic_flag {
            return Err(XuError::InvalidData(
                "H264: frame_mbs_only 序列中出现场图像".into(),
            ));
        }
        self.check_frame_num_gap(&sps, header)?;

        let id = self.dpb.alloc(nal_ref_idc, header);
        self.current = Some(id);

        self.decode_picture_order_count(&sps, header, id)?;
        self.apply_reference_marking(&sps, header, id)?;
        if header.slice_type.uses_list0() {
            self.build_reference_picture_lists(&sps, &pps, header, id)?;
        } else {
            self.ref_pic_list0.clear();
            self.ref_pic_list1.clear();
        }
        self.run_end_of_picture(id)?;

        let cur = self.ctx(id)?;
        debug!(
            "H264: 条带完成 slice_type={:?} frame_num={} poc={} 存活图像数={}",
            header.slice_type,
            cur.frame_num,
            cur.pic_order_cnt(),
            self.dpb.len()
        );
        Ok(())
    }

    /// 8.2.5.2 的间隙触发条件, 检出即失败.
    ///
    /// 帧号补齐 (gap 恢复) 不在支持范围内; 允许间隙的码流报
    /// `NotImplemented`, 不允许间隙的码流报 `InvalidData`.
    fn check_frame_num_gap(&self, sps: &SequenceParameterSet, header: &SliceHeader) -> XuResult<()> {
        if header.slice_type.is_intra() || self.prev_picture.is_none() {
            return Ok(());
        }
        let frame_num = u32::from(header.frame_num);
        let prev_ref = u32::from(self.prev_ref_frame_num);
        if frame_num == prev_ref || frame_num == (prev_ref + 1) % sps.max_frame_num() {
            return Ok(());
        }
        if sps.gaps_in_frame_num_value_allowed_flag {
            Err(XuError::NotImplemented(format!(
                "H264: frame_num 间隙补齐未实现, prev_ref={} cur={}",
                prev_ref, frame_num
            )))
        } else {
            Err(XuError::InvalidData(format!(
                "H264: frame_num 不连续且码流不允许间隙, prev_ref={} cur={}",
                prev_ref, frame_num
            )))
        }
    }

    /// 图像末尾边界: 应用推迟效果, 更新进位来源, 剔除失去
    /// 参考标记的图像 (当前图像豁免一轮).
    fn run_end_of_picture(&mut self, current_id: PictureId) -> XuResult<()> {
        let effects = std::mem::take(&mut self.pending_effects);
        for effect in effects {
            match effect {
                DeferredEffect::RebasePocAfterMmco5 { pic } => {
                    self.rebase_poc_after_mmco5(pic)?;
                }
            }
        }

        let current = self.ctx(current_id)?.clone();
        if current.nal_ref_idc != 0 {
            // MMCO 5 重定位之后这里读到的是归零后的 frame_num
            self.prev_ref_frame_num = current.frame_num;
        }
        self.prev_picture = Some(current);
        self.dpb.retain(|p| p.is_reference() || p.id == current_id);
        Ok(())
    }

    // ============================================================
    // 访问器
    // ============================================================

    /// 最近处理的条带建立的图像
    pub fn current_picture(&self) -> Option<&PictureContext> {
        self.current.and_then(|id| self.dpb.get(id))
    }

    /// 按句柄取图像
    pub fn picture(&self, id: PictureId) -> Option<&PictureContext> {
        self.dpb.get(id)
    }

    /// 全部存活图像
    pub fn pictures(&self) -> impl Iterator<Item = &PictureContext> {
        self.dpb.iter()
    }

    /// 参考图像列表 0, 元素可通过 [`Self::picture`] 解析
    pub fn ref_pic_list0(&self) -> &[PictureId] {
        &self.ref_pic_list0
    }

    /// 参考图像列表 1
    pub fn ref_pic_list1(&self) -> &[PictureId] {
        &self.ref_pic_list1
    }

    // ============================================================
    // 内部工具
    // ============================================================

    fn ctx(&self, id: PictureId) -> XuResult<&PictureContext> {
        self.dpb
            .get(id)
            .ok_or_else(|| XuError::Internal(format!("H264: 图像句柄 {} 已失效", id)))
    }

    fn ctx_mut(&mut self, id: PictureId) -> XuResult<&mut PictureContext> {
        self.dpb
            .get_mut(id)
            .ok_or_else(|| XuError::Internal(format!("H264: 图像句柄 {} 已失效", id)))
    }
}
