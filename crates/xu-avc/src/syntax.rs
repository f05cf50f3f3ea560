//! 结构化码流语法记录.
//!
//! 上游反序列化器把 NAL 单元解析为这里定义的记录后交给解码器;
//! 本模块只描述数据形状, 不含推导逻辑. 字段名与 ISO 14496/10
//! 的语法元素保持一致, 便于对照标准阅读.

// ============================================================
// 参数集
// ============================================================

/// 序列参数集 (SPS) 中本库消费的语法元素.
///
/// 同 id 的 SPS 再次到达时整体替换, 不做字段合并.
#[derive(Debug, Clone, Default)]
pub struct SequenceParameterSet {
    pub seq_parameter_set_id: u32,
    pub log2_max_frame_num_minus4: u8,
    /// 图像序计数算法选择
    pub pic_order_cnt_type: PicOrderCntType,
    /// 仅类型 0 使用
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    /// 仅类型 1 使用: 置位时条带头不携带 delta_pic_order_cnt, 按 0 推断
    pub delta_pic_order_always_zero_flag: bool,
    /// 仅类型 1 使用
    pub offset_for_non_ref_pic: i32,
    /// 仅类型 1 使用
    pub offset_for_top_to_bottom_field: i32,
    /// 仅类型 1 使用, 长度即 num_ref_frames_in_pic_order_cnt_cycle
    pub offset_for_ref_frame: Vec<i32>,
    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub frame_mbs_only_flag: bool,
}

impl SequenceParameterSet {
    /// MaxFrameNum (7-10)
    pub fn max_frame_num(&self) -> u32 {
        1 << (u32::from(self.log2_max_frame_num_minus4) + 4)
    }

    /// MaxPicOrderCntLsb (7-11)
    pub fn max_pic_order_cnt_lsb(&self) -> u32 {
        1 << (u32::from(self.log2_max_pic_order_cnt_lsb_minus4) + 4)
    }

    /// num_ref_frames_in_pic_order_cnt_cycle
    pub fn num_ref_frames_in_pic_order_cnt_cycle(&self) -> usize {
        self.offset_for_ref_frame.len()
    }
}

/// 图像参数集 (PPS) 中本库消费的语法元素
#[derive(Debug, Clone, Default)]
pub struct PictureParameterSet {
    pub pic_parameter_set_id: u32,
    /// 该 PPS 引用的 SPS
    pub seq_parameter_set_id: u32,
    /// 条带头未覆盖时的列表 0 活动参考数缺省值
    pub num_ref_idx_l0_default_active_minus1: u8,
    /// 条带头未覆盖时的列表 1 活动参考数缺省值
    pub num_ref_idx_l1_default_active_minus1: u8,
}

// ============================================================
// 条带头
// ============================================================

/// 条带类型 (slice_type % 5 的归一结果)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SliceType {
    P,
    B,
    #[default]
    I,
    Sp,
}

impl SliceType {
    /// I 条带 (触发参考集合与序计数进位的复位路径)
    pub fn is_intra(self) -> bool {
        self == SliceType::I
    }

    /// 需要构建参考图像列表 0 的条带类型
    pub fn uses_list0(self) -> bool {
        matches!(self, SliceType::P | SliceType::Sp | SliceType::B)
    }

    /// 需要构建参考图像列表 1 的条带类型
    pub fn uses_list1(self) -> bool {
        self == SliceType::B
    }
}

/// 图像序计数算法 (pic_order_cnt_type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PicOrderCntType {
    /// 类型 0: 由 pic_order_cnt_lsb 与 MSB 回绕推导
    #[default]
    Type0,
    /// 类型 1: 由 offset_for_ref_frame 周期期望值推导
    Type1,
    /// 类型 2: 直接由解码顺序 (frame_num) 推导
    Type2,
}

/// 条带头中本库消费的语法元素.
///
/// 生命周期仅覆盖单个 NAL 的处理过程.
#[derive(Debug, Clone, Default)]
pub struct SliceHeader {
    pub slice_type: SliceType,
    pub pic_parameter_set_id: u32,
    pub frame_num: u16,
    pub field_pic_flag: bool,
    pub bottom_field_flag: bool,
    /// 仅 pic_order_cnt_type = 0 使用
    pub pic_order_cnt_lsb: u16,
    /// 仅 pic_order_cnt_type = 0 的帧图像使用
    pub delta_pic_order_cnt_bottom: i32,
    /// 仅 pic_order_cnt_type = 1 使用
    pub delta_pic_order_cnt: [i32; 2],
    /// 置位时以条带头的活动参考数覆盖 PPS 缺省值
    pub num_ref_idx_active_override_flag: bool,
    pub num_ref_idx_l0_active_minus1: u8,
    pub num_ref_idx_l1_active_minus1: u8,
    pub ref_pic_list_modification_flag_l0: bool,
    pub ref_pic_list_modification_flag_l1: bool,
    pub ref_pic_list_mods_l0: Vec<RefPicListMod>,
    pub ref_pic_list_mods_l1: Vec<RefPicListMod>,
    /// 解码参考图像标记 (dec_ref_pic_marking), 仅参考图像携带
    pub drpm: DecRefPicMarking,
}

/// 解码参考图像标记命令块
#[derive(Debug, Clone, Default)]
pub struct DecRefPicMarking {
    /// IDR 专属: 置位时当前图像直接标记为长期参考
    pub long_term_reference_flag: bool,
    /// 置位时执行 ops 中的自适应命令, 否则走滑动窗口
    pub adaptive_ref_pic_marking_mode_flag: bool,
    pub ops: Vec<MmcoOp>,
}

/// 内存管理控制操作 (memory_management_control_operation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmcoOp {
    /// MMCO 0: 命令序列结束
    End,
    /// MMCO 1: 按 PicNumX 取消短期参考标记
    ForgetShort {
        difference_of_pic_nums_minus1: u32,
    },
    /// MMCO 2: 按 LongTermPicNum 取消长期参考标记
    ForgetLong {
        long_term_pic_num: u32,
    },
    /// MMCO 3: 短期参考图像转为长期参考图像
    ConvertShortToLong {
        difference_of_pic_nums_minus1: u32,
        long_term_frame_idx: u32,
    },
    /// MMCO 4: 收缩长期帧索引上限
    TrimLong {
        max_long_term_frame_idx_plus1: u32,
    },
    /// MMCO 5: 清空所有参考图像并重新起算解码顺序
    ClearAll,
    /// MMCO 6: 当前图像标记为长期参考图像
    MarkCurrentLong {
        long_term_frame_idx: u32,
    },
}

/// 参考图像列表重排序命令 (modification_of_pic_nums_idc)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefPicListMod {
    /// idc 0: 预测值减 abs_diff_pic_num 的短期重排
    ShortTermSub { abs_diff_pic_num_minus1: u32 },
    /// idc 1: 预测值加 abs_diff_pic_num 的短期重排
    ShortTermAdd { abs_diff_pic_num_minus1: u32 },
    /// idc 2: 按 long_term_pic_num 的长期重排
    LongTerm { long_term_pic_num: u32 },
    /// idc 3: 命令序列结束
    End,
}

// ============================================================
// NAL 承载记录
// ============================================================

/// 一条已反序列化的 NAL 记录
#[derive(Debug, Clone)]
pub struct NalUnit {
    /// 非零表示该 NAL 建立的图像为参考图像
    pub nal_ref_idc: u8,
    pub payload: NalPayload,
}

/// NAL 承载的语法内容, 按 nal_unit_type 归类
#[derive(Debug, Clone)]
pub enum NalPayload {
    /// nal_unit_type = 7
    Sps(SequenceParameterSet),
    /// nal_unit_type = 8
    Pps(PictureParameterSet),
    /// nal_unit_type = 1 (非 IDR 条带)
    Slice(SliceHeader),
    /// nal_unit_type = 5 (IDR 条带)
    IdrSlice(SliceHeader),
    /// nal_unit_type = 6, 本层忽略
    Sei,
    /// 其他 NAL 类型, 携带原始 nal_unit_type
    Other(u8),
}

impl NalUnit {
    /// 构造 SPS 记录
    pub fn sps(sps: SequenceParameterSet) -> Self {
        NalUnit {
            nal_ref_idc: 3,
            payload: NalPayload::Sps(sps),
        }
    }

    /// 构造 PPS 记录
    pub fn pps(pps: PictureParameterSet) -> Self {
        NalUnit {
            nal_ref_idc: 3,
            payload: NalPayload::Pps(pps),
        }
    }

    /// 构造 IDR 条带记录 (IDR 必为参考图像)
    pub fn idr(header: SliceHeader) -> Self {
        NalUnit {
            nal_ref_idc: 3,
            payload: NalPayload::IdrSlice(header),
        }
    }

    /// 构造非 IDR 条带记录, nal_ref_idc = 0 表示非参考图像
    pub fn slice(nal_ref_idc: u8, header: SliceHeader) -> Self {
        NalUnit {
            nal_ref_idc,
            payload: NalPayload::Slice(header),
        }
    }
}
